//! API error types with HTTP response mapping.
//!
//! Every failure returns `{"error": {"code", "message"}}` with a stable
//! reason code. Collaborator error detail is logged, never forwarded:
//! callers get a fixed human-readable summary for unavailability errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_store::StoreError;
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (bad id format, out-of-range quantity).
    BadRequest(String),
    /// Saga or store failure.
    Saga(SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        let body = serde_json::json!({
            "error": { "code": code, "message": message }
        });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, &'static str, String) {
    let code = err.reason_code();
    match &err {
        SagaError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, code, err.to_string()),
        SagaError::EventNotFound(_) | SagaError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, code, err.to_string())
        }
        SagaError::Store(StoreError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, code, err.to_string())
        }
        SagaError::Conflict { .. } | SagaError::InvalidState { .. } => {
            (StatusCode::CONFLICT, code, err.to_string())
        }
        SagaError::CatalogUnavailable(detail) => {
            tracing::error!(detail = %detail, "catalog unavailable");
            (
                StatusCode::BAD_GATEWAY,
                code,
                "catalog service unavailable".to_string(),
            )
        }
        SagaError::ReservationUnavailable(detail) => {
            tracing::error!(detail = %detail, "reservation service unavailable");
            (
                StatusCode::BAD_GATEWAY,
                code,
                "reservation service unavailable".to_string(),
            )
        }
        SagaError::Store(store_err) => {
            tracing::error!(error = %store_err, "order store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "order persistence failure".to_string(),
            )
        }
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Saga(SagaError::Store(err))
    }
}
