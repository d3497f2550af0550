//! Cart endpoints. The cart belongs to the signed-in user, or to the guest
//! session named by the `X-Session-Key` header when there is no token.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;

use commerce_cart::CartItemId;

use crate::app::dto::{AddCartItemRequest, UpdateCartItemRequest, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz::{require_owner, require_user};
use crate::context::RequestIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", patch(update_item).delete(remove_item))
        .route("/merge", post(merge_guest_cart))
}

async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let cart = services.run(move |s| s.cart_summary(&owner)).await?;
    Ok(Json(cart))
}

async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let cart = services
        .run(move |s| s.clear_cart(&owner, Utc::now()))
        .await?;
    Ok(Json(cart))
}

async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<AddCartItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let cart = services
        .run(move |s| {
            s.add_to_cart(&owner, body.product_id, body.variant_id, body.quantity, Utc::now())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(item_id): Path<String>,
    Json(body): Json<UpdateCartItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let item_id: CartItemId = parse_id(&item_id)?;
    let cart = services
        .run(move |s| s.update_cart_item(&owner, item_id, body.quantity, Utc::now()))
        .await?;
    Ok(Json(cart))
}

async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(item_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let item_id: CartItemId = parse_id(&item_id)?;
    let cart = services
        .run(move |s| s.remove_cart_item(&owner, item_id, Utc::now()))
        .await?;
    Ok(Json(cart))
}

/// Called right after login: needs both the token and the guest session key.
async fn merge_guest_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
) -> ApiResult<impl IntoResponse> {
    let user_id = require_user(&identity)?;
    let session = identity
        .session()
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("missing X-Session-Key header".to_string()))?;
    let cart = services
        .run(move |s| s.merge_carts(&session, user_id, Utc::now()))
        .await?;
    Ok(Json(cart))
}
