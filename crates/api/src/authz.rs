//! Request-level guards, checked before a service is called.

use commerce_auth::{Permission, Principal, authorize};
use commerce_cart::Owner;
use commerce_core::UserId;

use crate::app::errors::ApiError;
use crate::context::RequestIdentity;

/// The signed-in user; guests get 401.
pub fn require_user(identity: &RequestIdentity) -> Result<UserId, ApiError> {
    identity.user_id().ok_or(ApiError::Unauthenticated)
}

/// A signed-in user holding `permission`.
pub fn require_permission<'a>(
    identity: &'a RequestIdentity,
    permission: &Permission,
) -> Result<&'a Principal, ApiError> {
    let principal = identity.principal().ok_or(ApiError::Unauthenticated)?;
    authorize(principal, permission).map_err(|e| ApiError::Forbidden(e.to_string()))?;
    Ok(principal)
}

/// Whoever owns the cart: user or guest session.
pub fn require_owner(identity: &RequestIdentity) -> Result<Owner, ApiError> {
    identity.owner().ok_or(ApiError::Unauthenticated)
}

pub fn has_permission(identity: &RequestIdentity, permission: &Permission) -> bool {
    identity
        .principal()
        .is_some_and(|p| authorize(p, permission).is_ok())
}
