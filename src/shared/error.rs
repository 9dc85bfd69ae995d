//! Application Error Types
//!
//! Centralized error handling with Axum integration. Every failure leaves the
//! HTTP boundary as `{"success": false, "error": "...", "code": n}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// HTTP status, numeric code and the message shown to the user.
    ///
    /// Internal failures never leak their detail.
    pub fn parts(&self) -> (StatusCode, u16, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, 10001, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, 10002, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, 10003, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, 10004, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, 10005, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, 10007, msg.clone()),
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                10000,
                "Internal server error".into(),
            ),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Database(e) => tracing::error!("Database error: {}", e),
            AppError::Redis(e) => tracing::error!("Redis error: {}", e),
            _ => {}
        }

        let (status, code, error) = self.parts();
        let body = ErrorResponse {
            success: false,
            error,
            code,
            errors: None,
        };

        (status, Json(body)).into_response()
    }
}
