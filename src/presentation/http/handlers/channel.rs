//! Channel Handlers

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::application::dto::request::{
    ArchiveChannelRequest, CreateChannelRequest, UpdateChannelRequest,
};
use crate::application::dto::response::DeletedResponse;
use crate::application::services::{ChannelService, ChannelSummary};
use crate::domain::{Channel, UnreadCount};
use crate::presentation::http::extractors::IdPath;
use crate::presentation::http::services::channel_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::{created, ApiResponse};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Create a new channel
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Json(body): Json<CreateChannelRequest>,
) -> Result<(StatusCode, ApiResponse<Channel>), AppError> {
    validate(&body)?;

    let channel = channel_service(&state)
        .create_channel(community_id, auth.user_id, body.into())
        .await?;

    Ok(created(channel))
}

/// List a community's channels with unread counts
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<ApiResponse<Vec<ChannelSummary>>, AppError> {
    let channels = channel_service(&state)
        .list_channels(community_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(channels))
}

/// Unread counts for every channel of a community
pub async fn unread_counts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<ApiResponse<Vec<UnreadCount>>, AppError> {
    let counts = channel_service(&state)
        .unread_counts(community_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(counts))
}

/// Get channel by ID
pub async fn get_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
) -> Result<ApiResponse<Channel>, AppError> {
    let channel = channel_service(&state)
        .get_channel(channel_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(channel))
}

/// Update channel
pub async fn update_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
    Json(body): Json<UpdateChannelRequest>,
) -> Result<ApiResponse<Channel>, AppError> {
    validate(&body)?;

    let channel = channel_service(&state)
        .update_channel(channel_id, auth.user_id, body.into())
        .await?;

    Ok(ApiResponse::ok(channel))
}

/// Archive or unarchive a channel
pub async fn archive_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
    Json(body): Json<ArchiveChannelRequest>,
) -> Result<ApiResponse<Channel>, AppError> {
    let channel = channel_service(&state)
        .archive_channel(channel_id, auth.user_id, body.archived)
        .await?;
    Ok(ApiResponse::ok(channel))
}

/// Delete channel
pub async fn delete_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
) -> Result<ApiResponse<DeletedResponse>, AppError> {
    channel_service(&state)
        .delete_channel(channel_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(DeletedResponse::new(channel_id)))
}
