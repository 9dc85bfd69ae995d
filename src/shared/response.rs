//! Success envelope shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Success envelope with 201 Created.
pub fn created<T: Serialize>(data: T) -> (StatusCode, ApiResponse<T>) {
    (StatusCode::CREATED, ApiResponse::ok(data))
}
