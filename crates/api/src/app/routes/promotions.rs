use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use commerce_auth::Permission;
use commerce_core::DomainError;
use commerce_infra::services::promotions::{NewCoupon, NewFlashSale, NewSaleItem};
use commerce_promotions::{CouponId, FlashSaleId};

use crate::app::dto::parse_id;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::RequestIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/coupons/:id/deactivate", post(deactivate_coupon))
        .route("/flash-sales", get(live_flash_sales).post(create_flash_sale))
        .route("/flash-sales/:id", get(get_flash_sale))
        .route("/flash-sales/:id/items", post(add_flash_sale_item))
        .route("/flash-sales/:id/end", post(end_flash_sale))
}

async fn list_coupons(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::PROMOTIONS_MANAGE)?;
    Ok(Json(services.read(|s| s.list_coupons())))
}

async fn create_coupon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<NewCoupon>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::PROMOTIONS_MANAGE)?;
    let coupon = services
        .run(move |s| s.create_coupon(body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

async fn deactivate_coupon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::PROMOTIONS_MANAGE)?;
    let coupon_id: CouponId = parse_id(&id)?;
    let coupon = services
        .run(move |s| s.deactivate_coupon(coupon_id, Utc::now()))
        .await?;
    Ok(Json(coupon))
}

/// Public: sales running right now, with their discounted items.
async fn live_flash_sales(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.read(|s| s.live_flash_sales(Utc::now())))
}

async fn get_flash_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let sale_id: FlashSaleId = parse_id(&id)?;
    let sale = services
        .read(|s| s.flash_sale(sale_id))
        .ok_or_else(|| DomainError::not_found(format!("flash sale {sale_id}")))?;
    Ok(Json(sale))
}

async fn create_flash_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<NewFlashSale>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::PROMOTIONS_MANAGE)?;
    let sale = services
        .run(move |s| s.create_flash_sale(body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn add_flash_sale_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<NewSaleItem>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::PROMOTIONS_MANAGE)?;
    let sale_id: FlashSaleId = parse_id(&id)?;
    let sale = services
        .run(move |s| s.add_flash_sale_item(sale_id, body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn end_flash_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::PROMOTIONS_MANAGE)?;
    let sale_id: FlashSaleId = parse_id(&id)?;
    let sale = services
        .run(move |s| s.end_flash_sale(sale_id, Utc::now()))
        .await?;
    Ok(Json(sale))
}
