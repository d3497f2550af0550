//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store selection, services, notification worker
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and path parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use commerce_auth::Hs256JwtValidator;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub async fn build_app(config: &ApiConfig) -> Result<Router, services::BuildError> {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(config).await?);

    let api = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::identity_middleware,
            ))
            .layer(Extension(services)),
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(api))
}
