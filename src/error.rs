use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Request-level errors, rendered as JSON.
///
/// Nothing in the load simulator itself surfaces here: contention and
/// cancellation are expected behavior and are recovered locally with logging.
/// What remains is entity lookups and the rare internal failure (a panicked
/// blocking task), neither of which is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Entity not found with id: {0}")]
    EntityNotFound(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::EntityNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
