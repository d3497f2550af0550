use std::str::FromStr;

use serde::Deserialize;

use commerce_catalog::{ProductId, VariantId};
use commerce_core::{DomainError, Money, UserId};
use commerce_orders::{OrderStatus, PaymentStatus};

use crate::app::errors::ApiResult;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ChangePriceRequest {
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub price: Money,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub status: PaymentStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignComplaintRequest {
    pub assignee: UserId,
}

#[derive(Debug, Deserialize)]
pub struct RespondComplaintRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveComplaintRequest {
    pub resolution: String,
}

#[derive(Debug, Deserialize)]
pub struct RateComplaintRequest {
    pub rating: u8,
    #[serde(default)]
    pub feedback: Option<String>,
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// `?scope=all` widens a listing from the caller's own records to everything
/// (staff only); complaints also accept `overdue`.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: Option<String>,
}

/// Parse a path segment into a typed id (bad input is a 400 `invalid_id`).
pub fn parse_id<T>(raw: &str) -> ApiResult<T>
where
    T: FromStr<Err = DomainError>,
{
    Ok(raw.parse::<T>()?)
}
