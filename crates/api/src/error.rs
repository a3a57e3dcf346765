use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use qedit_core::error::CoreError;
use qedit_queue::{ProcessError, QueueError};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`QueueError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `qedit_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Admission, lookup or resource-guard error from the queue.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The inference engine failed or timed out on a synchronous call.
    #[error(transparent)]
    Engine(#[from] ProcessError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            // --- Queue errors ---
            AppError::Queue(err) => match err {
                QueueError::QueueFull { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "QUEUE_FULL", err.to_string())
                }
                QueueError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                QueueError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, "BUSY", err.to_string()),
            },

            // --- Engine errors ---
            AppError::Engine(err) if err.is_timeout() => {
                tracing::warn!(error = %err, "Engine call timed out");
                (StatusCode::GATEWAY_TIMEOUT, "ENGINE_TIMEOUT", err.to_string())
            }
            AppError::Engine(err) => {
                tracing::error!(error = %err, "Engine call failed");
                (StatusCode::BAD_GATEWAY, "ENGINE_ERROR", err.to_string())
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
