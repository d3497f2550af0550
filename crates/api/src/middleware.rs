use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use commerce_auth::{JwtValidator, Principal};
use commerce_core::SessionKey;

use crate::app::errors::ApiError;
use crate::context::RequestIdentity;

pub const SESSION_HEADER: &str = "x-session-key";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolve the caller's identity. Both credentials are optional, but one that
/// is present must be valid: a bad token is 401, a bad session key 400.
pub async fn identity_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let identity = match resolve_identity(&state, req.headers()) {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    req.extensions_mut().insert(identity);
    next.run(req).await
}

fn resolve_identity(state: &AuthState, headers: &HeaderMap) -> Result<RequestIdentity, ApiError> {
    let principal = match extract_bearer(headers)? {
        Some(token) => {
            let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                ApiError::Unauthenticated
            })?;
            Some(Principal::from_claims(&claims))
        }
        None => None,
    };

    let session = match headers.get(SESSION_HEADER) {
        Some(raw) => {
            let raw = raw
                .to_str()
                .map_err(|_| ApiError::BadRequest("session key must be ASCII".into()))?;
            Some(SessionKey::parse(raw)?)
        }
        None => None,
    };

    Ok(RequestIdentity::new(principal, session))
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| ApiError::Unauthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?
        .trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated);
    }
    Ok(Some(token))
}
