//! HTTP handlers
//!
//! Thin axum layer over the analyzer: request validation, status mapping
//! and metrics bookkeeping. The pipeline itself never fails a request.

pub mod analyze;
pub mod stats;
pub mod system;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::ValidationErrors;

/// API-level error with its HTTP status
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn validation(errors: ValidationErrors) -> Self {
        Self { status: StatusCode::UNPROCESSABLE_ENTITY, message: errors.to_string() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        Self::internal(format!("Database error: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(serde_json::json!({
            "error": self.message,
            "code": self.status.as_u16(),
        }));
        (self.status, body).into_response()
    }
}
