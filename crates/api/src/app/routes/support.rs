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
use commerce_infra::services::support::NewComplaint;
use commerce_support::ComplaintId;

use crate::app::dto::{
    AssignComplaintRequest, RateComplaintRequest, ResolveComplaintRequest,
    RespondComplaintRequest, ScopeQuery, parse_id,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz::{has_permission, require_permission, require_user};
use crate::context::RequestIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/complaints", get(list_complaints).post(open_complaint))
        .route("/complaints/:id", get(get_complaint))
        .route("/complaints/:id/assign", post(assign_complaint))
        .route("/complaints/:id/respond", post(respond_to_complaint))
        .route("/complaints/:id/resolve", post(resolve_complaint))
        .route("/complaints/:id/close", post(close_complaint))
        .route("/complaints/:id/rate", post(rate_complaint))
}

async fn open_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(body): Json<NewComplaint>,
) -> ApiResult<impl IntoResponse> {
    let customer = require_user(&identity)?;
    let complaint = services
        .run(move |s| s.open_complaint(customer, body, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// Customers see their own complaints. Support staff may ask for the whole
/// queue (`?scope=all`) or only the ones past their SLA (`?scope=overdue`).
async fn list_complaints(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let complaints = match query.scope.as_deref() {
        None | Some("mine") => {
            let customer = require_user(&identity)?;
            services.read(|s| s.complaints_for(customer, now))
        }
        Some("all") => {
            require_permission(&identity, &Permission::SUPPORT_MANAGE)?;
            services.read(|s| s.complaint_queue(now))
        }
        Some("overdue") => {
            require_permission(&identity, &Permission::SUPPORT_MANAGE)?;
            services.read(|s| s.overdue_complaints(now))
        }
        Some(other) => return Err(ApiError::BadRequest(format!("unknown scope {other}"))),
    };
    Ok(Json(complaints))
}

async fn get_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let complaint_id: ComplaintId = parse_id(&id)?;
    let now = Utc::now();
    if has_permission(&identity, &Permission::SUPPORT_MANAGE) {
        let complaint = services
            .read(|s| s.complaint(complaint_id, now))
            .ok_or_else(|| DomainError::not_found(format!("complaint {complaint_id}")))?;
        return Ok(Json(complaint));
    }
    let customer = require_user(&identity)?;
    let complaint = services.read(|s| s.customer_complaint(customer, complaint_id, now))?;
    Ok(Json(complaint))
}

async fn assign_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<AssignComplaintRequest>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::SUPPORT_MANAGE)?;
    let complaint_id: ComplaintId = parse_id(&id)?;
    let complaint = services
        .run(move |s| s.assign_complaint(complaint_id, body.assignee, Utc::now()))
        .await?;
    Ok(Json(complaint))
}

async fn respond_to_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<RespondComplaintRequest>,
) -> ApiResult<impl IntoResponse> {
    let responder = require_permission(&identity, &Permission::SUPPORT_MANAGE)?.user_id;
    let complaint_id: ComplaintId = parse_id(&id)?;
    let complaint = services
        .run(move |s| s.respond_to_complaint(complaint_id, responder, body.message, Utc::now()))
        .await?;
    Ok(Json(complaint))
}

async fn resolve_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<ResolveComplaintRequest>,
) -> ApiResult<impl IntoResponse> {
    let resolved_by = require_permission(&identity, &Permission::SUPPORT_MANAGE)?.user_id;
    let complaint_id: ComplaintId = parse_id(&id)?;
    let complaint = services
        .run(move |s| s.resolve_complaint(complaint_id, resolved_by, body.resolution, Utc::now()))
        .await?;
    Ok(Json(complaint))
}

async fn close_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&identity, &Permission::SUPPORT_MANAGE)?;
    let complaint_id: ComplaintId = parse_id(&id)?;
    let complaint = services
        .run(move |s| s.close_complaint(complaint_id, Utc::now()))
        .await?;
    Ok(Json(complaint))
}

async fn rate_complaint(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(id): Path<String>,
    Json(body): Json<RateComplaintRequest>,
) -> ApiResult<impl IntoResponse> {
    let customer = require_user(&identity)?;
    let complaint_id: ComplaintId = parse_id(&id)?;
    let complaint = services
        .run(move |s| s.rate_complaint(customer, complaint_id, body.rating, body.feedback, Utc::now()))
        .await?;
    Ok(Json(complaint))
}
