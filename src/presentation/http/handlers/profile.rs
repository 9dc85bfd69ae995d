//! Profile Handlers

use axum::extract::{Extension, Json, Path, State};

use crate::application::dto::request::UpdateProfileRequest;
use crate::application::services::ProfileService;
use crate::domain::{Community, User};
use crate::presentation::http::extractors::IdPath;
use crate::presentation::http::services::profile_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::ApiResponse;
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Get the caller's profile, provisioning it on first use
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<User>, AppError> {
    let user = profile_service(&state).ensure_profile(auth.user_id).await?;
    Ok(ApiResponse::ok(user))
}

/// Update the caller's profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<User>, AppError> {
    validate(&body)?;

    let service = profile_service(&state);
    service.ensure_profile(auth.user_id).await?;
    let user = service
        .update_profile(auth.user_id, auth.user_id, body.into())
        .await?;

    Ok(ApiResponse::ok(user))
}

/// Communities the caller belongs to
pub async fn get_my_communities(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<Community>>, AppError> {
    let communities = profile_service(&state)
        .list_communities(auth.user_id)
        .await?;
    Ok(ApiResponse::ok(communities))
}

/// Get a profile by user ID
pub async fn get_user(
    State(state): State<AppState>,
    IdPath(user_id): IdPath,
) -> Result<ApiResponse<User>, AppError> {
    let user = profile_service(&state).get_profile(user_id).await?;
    Ok(ApiResponse::ok(user))
}

/// Get a profile by username
pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<ApiResponse<User>, AppError> {
    let user = profile_service(&state)
        .get_profile_by_username(&username)
        .await?;
    Ok(ApiResponse::ok(user))
}
