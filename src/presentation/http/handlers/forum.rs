//! Forum Handlers
//!
//! Post listings are served from the page cache when possible. The
//! membership check always runs first so a cached page never leaks past a
//! private community.

use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
};
use tracing::warn;

use crate::application::dto::request::{
    CreateCommentRequest, CreatePostRequest, LockPostRequest, PinPostRequest, PostQueryParams,
    UpdateCommentRequest, UpdatePostRequest, VoteRequest,
};
use crate::application::dto::response::PostListResponse;
use crate::application::services::{tags, CreateCommentDto, ForumService, PostQueryDto, PostView};
use crate::domain::{Comment, Post, PostSort};
use crate::infrastructure::cache::keys;
use crate::presentation::http::extractors::{parse_optional_id, IdPath};
use crate::presentation::http::services::forum_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::{created, ApiResponse};
use crate::shared::validation::validate;
use crate::startup::AppState;

impl TryFrom<PostQueryParams> for PostQueryDto {
    type Error = AppError;

    fn try_from(params: PostQueryParams) -> Result<Self, Self::Error> {
        let sort = match params.sort.as_deref() {
            None => PostSort::default(),
            Some(s) => PostSort::from_str(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown sort: {}", s)))?,
        };
        Ok(Self {
            sort,
            page: params.page,
            per_page: params.per_page,
        })
    }
}

/// Create a post
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, ApiResponse<Post>), AppError> {
    validate(&body)?;

    let post = forum_service(&state)
        .create_post(community_id, auth.user_id, body.into())
        .await?;

    Ok(created(post))
}

/// List a community's posts
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Query(params): Query<PostQueryParams>,
) -> Result<ApiResponse<PostListResponse>, AppError> {
    let query = PostQueryDto::try_from(params)?;
    let forum = forum_service(&state);
    forum.check_viewer(community_id, auth.user_id).await?;

    let page = query.page.unwrap_or(1).max(1);
    let key = keys::post_listing(community_id, query.sort.as_str(), page, query.per_page());

    match state.page_cache.get::<PostListResponse>(&key).await {
        Ok(Some(cached)) => return Ok(ApiResponse::ok(cached)),
        Ok(None) => {}
        Err(e) => warn!(error = %e, key, "Page cache read failed"),
    }

    let posts = forum
        .list_posts(community_id, auth.user_id, query.clone())
        .await?;
    let response = PostListResponse::new(posts, &query);

    let page_tags = [tags::community_posts(community_id), tags::community(community_id)];
    if let Err(e) = state.page_cache.put(&key, &page_tags, &response).await {
        warn!(error = %e, key, "Page cache write failed");
    }

    Ok(ApiResponse::ok(response))
}

/// Get a post with the caller's vote
pub async fn get_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
) -> Result<ApiResponse<PostView>, AppError> {
    let post = forum_service(&state).get_post(post_id, auth.user_id).await?;
    Ok(ApiResponse::ok(post))
}

/// Edit a post
pub async fn update_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
    Json(body): Json<UpdatePostRequest>,
) -> Result<ApiResponse<Post>, AppError> {
    validate(&body)?;

    let post = forum_service(&state)
        .edit_post(post_id, auth.user_id, body.into())
        .await?;

    Ok(ApiResponse::ok(post))
}

/// Delete a post
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
) -> Result<ApiResponse<Post>, AppError> {
    let post = forum_service(&state)
        .delete_post(post_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(post))
}

/// Cast, change or clear a vote
pub async fn vote_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
    Json(body): Json<VoteRequest>,
) -> Result<ApiResponse<Post>, AppError> {
    let post = forum_service(&state)
        .vote(post_id, auth.user_id, body.value)
        .await?;
    Ok(ApiResponse::ok(post))
}

/// Lock or unlock a post
pub async fn lock_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
    Json(body): Json<LockPostRequest>,
) -> Result<ApiResponse<Post>, AppError> {
    let post = forum_service(&state)
        .lock_post(post_id, auth.user_id, body.locked)
        .await?;
    Ok(ApiResponse::ok(post))
}

/// Pin or unpin a post
pub async fn pin_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
    Json(body): Json<PinPostRequest>,
) -> Result<ApiResponse<Post>, AppError> {
    let post = forum_service(&state)
        .pin_post(post_id, auth.user_id, body.pinned)
        .await?;
    Ok(ApiResponse::ok(post))
}

/// Comment on a post or reply to a comment
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, ApiResponse<Comment>), AppError> {
    validate(&body)?;

    let request = CreateCommentDto {
        body: body.body,
        parent_id: parse_optional_id(body.parent_id.as_deref())?,
    };

    let comment = forum_service(&state)
        .add_comment(post_id, auth.user_id, request)
        .await?;

    Ok(created(comment))
}

/// All comments of a post
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(post_id): IdPath,
) -> Result<ApiResponse<Vec<Comment>>, AppError> {
    let comments = forum_service(&state)
        .list_comments(post_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(comments))
}

/// Edit a comment
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(comment_id): IdPath,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<ApiResponse<Comment>, AppError> {
    validate(&body)?;

    let comment = forum_service(&state)
        .edit_comment(comment_id, auth.user_id, body.body)
        .await?;

    Ok(ApiResponse::ok(comment))
}

/// Delete a comment
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(comment_id): IdPath,
) -> Result<ApiResponse<Comment>, AppError> {
    let comment = forum_service(&state)
        .delete_comment(comment_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(comment))
}
