use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::DbError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Converts our custom `AppError` into an HTTP response.
///
/// Every error leaves the server as a JSON envelope with a `type`
/// discriminator and a human-readable `error` message, so clients can branch
/// on the kind without parsing prose.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match self {
            AppError::Validation(message) => {
                tracing::warn!(error = %message, "Request validation failed.");
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            // A result the driver could not decode is the gateway's fault,
            // not the statement's; it maps to 500, not 400.
            AppError::Database(db_err @ DbError::Decode { .. }) => {
                tracing::error!(error = ?db_err, "Failed to decode a result set.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred while reading the result set".to_string(),
                )
            }
            // Everything else the database reports, including a failure to
            // obtain a connection for this request, comes back as a 400 with
            // the driver's text. Statement failures are never fatal.
            AppError::Database(db_err) => {
                tracing::error!(error = ?db_err, "Statement execution failed.");
                (StatusCode::BAD_REQUEST, "execution_error", db_err.to_string())
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
        };

        let body = Json(json!({ "type": kind, "error": error_message }));
        (status, body).into_response()
    }
}
