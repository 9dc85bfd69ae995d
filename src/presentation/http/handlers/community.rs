//! Community Handlers

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};

use crate::application::dto::request::{
    CreateCommunityRequest, MembersQueryParams, SetRoleRequest, UpdateCommunityRequest,
};
use crate::application::dto::response::DeletedResponse;
use crate::application::services::{CommunityDetail, CommunityService, MemberQueryDto};
use crate::domain::{Community, Member, MemberStatus};
use crate::presentation::http::extractors::{parse_optional_id, IdPairPath, IdPath};
use crate::presentation::http::services::community_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::{created, ApiResponse};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Create a community
pub async fn create_community(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateCommunityRequest>,
) -> Result<(StatusCode, ApiResponse<CommunityDetail>), AppError> {
    validate(&body)?;

    let community = community_service(&state)
        .create_community(auth.user_id, body.into())
        .await?;

    Ok(created(community))
}

/// Get community by ID
pub async fn get_community(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<ApiResponse<CommunityDetail>, AppError> {
    let community = community_service(&state)
        .get_community(community_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(community))
}

/// Get community by slug
pub async fn get_community_by_slug(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> Result<ApiResponse<CommunityDetail>, AppError> {
    let community = community_service(&state)
        .get_community_by_slug(&slug, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(community))
}

/// Update community settings
pub async fn update_community(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Json(body): Json<UpdateCommunityRequest>,
) -> Result<ApiResponse<Community>, AppError> {
    validate(&body)?;

    let community = community_service(&state)
        .update_community(community_id, auth.user_id, body.into())
        .await?;

    Ok(ApiResponse::ok(community))
}

/// Delete community
pub async fn delete_community(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<ApiResponse<DeletedResponse>, AppError> {
    community_service(&state)
        .delete_community(community_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(DeletedResponse::new(community_id)))
}

/// Join a community
pub async fn join_community(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<ApiResponse<Member>, AppError> {
    let member = community_service(&state)
        .join_community(community_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(member))
}

/// Leave a community
pub async fn leave_community(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<StatusCode, AppError> {
    community_service(&state)
        .leave_community(community_id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List members, optionally filtered by status
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Query(params): Query<MembersQueryParams>,
) -> Result<ApiResponse<Vec<Member>>, AppError> {
    let query = MemberQueryDto {
        status: params.status.as_deref().map(MemberStatus::from_str),
        after: parse_optional_id(params.after.as_deref())?,
        limit: params.limit,
    };

    let members = community_service(&state)
        .list_members(community_id, auth.user_id, query)
        .await?;

    Ok(ApiResponse::ok(members))
}

/// Approve a pending member
pub async fn approve_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPairPath(community_id, user_id): IdPairPath,
) -> Result<ApiResponse<Member>, AppError> {
    let member = community_service(&state)
        .approve_member(community_id, auth.user_id, user_id)
        .await?;
    Ok(ApiResponse::ok(member))
}

/// Change a member's role
pub async fn set_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPairPath(community_id, user_id): IdPairPath,
    Json(body): Json<SetRoleRequest>,
) -> Result<ApiResponse<Member>, AppError> {
    let member = community_service(&state)
        .set_member_role(community_id, auth.user_id, user_id, body.role)
        .await?;
    Ok(ApiResponse::ok(member))
}

/// Remove a member
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPairPath(community_id, user_id): IdPairPath,
) -> Result<StatusCode, AppError> {
    community_service(&state)
        .remove_member(community_id, auth.user_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Ban a member
pub async fn ban_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPairPath(community_id, user_id): IdPairPath,
) -> Result<ApiResponse<Member>, AppError> {
    let member = community_service(&state)
        .ban_member(community_id, auth.user_id, user_id)
        .await?;
    Ok(ApiResponse::ok(member))
}
