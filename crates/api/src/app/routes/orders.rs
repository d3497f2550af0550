use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use commerce_auth::Permission;
use commerce_core::DomainError;
use commerce_infra::services::PlaceOrderRequest;
use commerce_orders::OrderId;

use crate::app::dto::{
    CancelOrderRequest, ChangeStatusRequest, RecordPaymentRequest, ScopeQuery, parse_id,
};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{has_permission, require_owner, require_permission};
use crate::context::RequestIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/status", post(change_status))
        .route("/:id/payment", post(record_payment))
}

async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<PlaceOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let order = services
        .run(move |s| s.place_order(&owner, body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders; order staff may pass `?scope=all`.
async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<impl IntoResponse> {
    if query.scope.as_deref() == Some("all") {
        require_permission(&identity, &Permission::ORDERS_MANAGE)?;
        return Ok(Json(services.read(|s| s.list_orders())));
    }
    let owner = require_owner(&identity)?;
    Ok(Json(services.read(|s| s.orders_for(&owner))))
}

async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let order_id: OrderId = parse_id(&id)?;
    let staff = has_permission(&identity, &Permission::ORDERS_MANAGE);
    let owner = identity.owner();

    let order = services.run(move |s| s.order_detail(order_id)).await?;
    // Someone else's order reads as missing rather than forbidden.
    let order = order
        .filter(|o| staff || (owner.is_some() && o.placed_by == owner))
        .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
    Ok(Json(order))
}

async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    body: Option<Json<CancelOrderRequest>>,
) -> ApiResult<impl IntoResponse> {
    let owner = require_owner(&identity)?;
    let order_id: OrderId = parse_id(&id)?;
    let Json(body) = body.unwrap_or_default();
    let order = services
        .run(move |s| s.cancel_order(&owner, order_id, body.reason, Utc::now()))
        .await?;
    Ok(Json(order))
}

async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<ChangeStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = require_permission(&identity, &Permission::ORDERS_MANAGE)?;
    let changed_by = principal.user_id;
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .run(move |s| {
            s.change_order_status(order_id, body.status, body.notes, Some(changed_by), Utc::now())
        })
        .await?;
    Ok(Json(order))
}

async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<RecordPaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::ORDERS_MANAGE)?;
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .run(move |s| s.record_payment(order_id, body.status, body.reference, Utc::now()))
        .await?;
    Ok(Json(order))
}
