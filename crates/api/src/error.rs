//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::SagaError;
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Saga or service error.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    let status = match &err {
        SagaError::Validation(_) | SagaError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        SagaError::Conflict(_) => StatusCode::CONFLICT,
        SagaError::NotFound { .. } => StatusCode::NOT_FOUND,
        SagaError::Domain(e) if e.is_conflict() => StatusCode::CONFLICT,
        SagaError::Domain(_) => StatusCode::BAD_REQUEST,
        SagaError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        SagaError::Store(e) if e.is_conflict() => StatusCode::CONFLICT,
        SagaError::Remote(_) => StatusCode::BAD_GATEWAY,
        SagaError::StockDecrementFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::AppointmentCancelFailed { .. }
        | SagaError::FinalizeFailed { .. }
        | SagaError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use saga::RemoteError;

    use super::*;

    fn status_of(err: SagaError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(
            status_of(SagaError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SagaError::InsufficientStock {
                medicine: "m".into(),
                required: 2,
                available: 1
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(SagaError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(SagaError::NotFound {
                entity: "Schedule",
                id: "1".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(domain::ScheduleError::AlreadyCancelled.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_store_errors() {
        assert_eq!(
            status_of(SagaError::Store(StoreError::StatusConflict {
                entity: "Prescription",
                id: "1".into(),
                expected: "ACTIVE".into(),
                actual: "CANCELLED".into(),
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SagaError::Store(StoreError::Unavailable("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_remote_errors() {
        let remote = RemoteError::Transport {
            service: "medicine-service",
            message: "timeout".into(),
        };
        assert_eq!(status_of(remote.clone().into()), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(SagaError::AppointmentCancelFailed {
                restored_status: "BOOKED".into(),
                source: remote,
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
