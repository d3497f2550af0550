//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is recoverable: callers surface it to the client with its
/// message. Infrastructure failures live in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A product, variant, cart, order or coupon does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A cart item id does not belong to the cart.
    #[error("cart item not found")]
    ItemNotFound,

    /// Requested quantity exceeds the stock that is still available.
    #[error("insufficient stock: requested {requested}, only {available} available")]
    InsufficientStock { requested: u32, available: u32 },

    /// An item became unavailable between cart and checkout.
    #[error("out of stock: {0}")]
    OutOfStock(String),

    /// Coupon does not exist or cannot be applied to this order.
    #[error("invalid coupon: {0}")]
    InvalidCoupon(String),

    /// Checkout was attempted on a missing or empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn out_of_stock(msg: impl Into<String>) -> Self {
        Self::OutOfStock(msg.into())
    }

    pub fn invalid_coupon(msg: impl Into<String>) -> Self {
        Self::InvalidCoupon(msg.into())
    }

    /// Stable machine-readable code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::ItemNotFound => "item_not_found",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::OutOfStock(_) => "out_of_stock",
            Self::InvalidCoupon(_) => "invalid_coupon",
            Self::EmptyCart => "empty_cart",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized => "unauthorized",
        }
    }
}
