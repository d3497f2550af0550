use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::context::RequestIdentity;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(identity): Extension<RequestIdentity>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": identity.user_id().map(|id| id.to_string()),
        "session_key": identity.session().map(|s| s.as_str().to_string()),
        "roles": identity.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}
