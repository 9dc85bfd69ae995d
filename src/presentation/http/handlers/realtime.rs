//! Realtime Token Handler

use axum::extract::{Extension, State};

use crate::application::services::{RealtimeService, RealtimeToken};
use crate::presentation::http::services::realtime_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::ApiResponse;
use crate::startup::AppState;

/// Issue a short-lived capability token for the broker gateway
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<RealtimeToken>, AppError> {
    let token = realtime_service(&state).issue_token(auth.user_id).await?;
    Ok(ApiResponse::ok(token))
}
