use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use commerce_core::DomainError;
use commerce_infra::command_dispatcher::DispatchError;
use commerce_infra::services::ServiceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Service(value.into())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(value: tokio::task::JoinError) -> Self {
        ApiError::Task(value.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::InsufficientStock { .. } | DomainError::OutOfStock(_) | DomainError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        DomainError::InvalidCoupon(_)
        | DomainError::EmptyCart
        | DomainError::Validation(_)
        | DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) | DomainError::ItemNotFound => StatusCode::NOT_FOUND,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(ServiceError::Dispatch(DispatchError::Domain(err))) => {
                json_error(domain_status(&err), err.code(), err.to_string())
            }
            ApiError::Service(err) => {
                tracing::error!(error = %err, "request failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
            }
            ApiError::Unauthenticated => {
                json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required")
            }
            ApiError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Task(msg) => {
                tracing::error!(error = %msg, "blocking task failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let cases = [
            (DomainError::InsufficientStock { requested: 3, available: 1 }, StatusCode::CONFLICT),
            (DomainError::out_of_stock("Mug is out of stock"), StatusCode::CONFLICT),
            (DomainError::conflict("stream moved"), StatusCode::CONFLICT),
            (DomainError::invalid_coupon("expired"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::EmptyCart, StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::invalid_id("nope"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("order"), StatusCode::NOT_FOUND),
            (DomainError::ItemNotFound, StatusCode::NOT_FOUND),
            (DomainError::Unauthorized, StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(status_of(err.clone()), status, "{err:?}");
        }
    }

    #[test]
    fn lock_poisoning_is_a_server_error() {
        let response = ApiError::Service(ServiceError::LockPoisoned).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
