//! Message Handlers
//!
//! Root messages, threads, pins and read state.

use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
};

use crate::application::dto::request::{
    EditMessageRequest, MarkReadRequest, MessageQueryParams, PinQueryParams, SendMessageRequest,
};
use crate::application::services::{
    CreateMessageDto, MessagePage, MessageQueryDto, MessageService, ThreadPage,
};
use crate::domain::{Message, ReadState, UnreadCount};
use crate::presentation::http::extractors::{parse_optional_id, IdPath};
use crate::presentation::http::services::message_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::{created, ApiResponse};
use crate::shared::validation::validate;
use crate::startup::AppState;

impl TryFrom<MessageQueryParams> for MessageQueryDto {
    type Error = AppError;

    fn try_from(params: MessageQueryParams) -> Result<Self, Self::Error> {
        let query = Self {
            before: parse_optional_id(params.before.as_deref())?,
            after: parse_optional_id(params.after.as_deref())?,
            limit: params.limit,
        };
        if query.before.is_some() && query.after.is_some() {
            return Err(AppError::BadRequest(
                "Use either before or after, not both".into(),
            ));
        }
        Ok(query)
    }
}

/// Send a message or a thread reply
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, ApiResponse<Message>), AppError> {
    validate(&body)?;

    let request = CreateMessageDto {
        content: body.content,
        reply_to: parse_optional_id(body.reply_to.as_deref())?,
    };

    let message = message_service(&state)
        .send_message(channel_id, auth.user_id, request)
        .await?;

    Ok(created(message))
}

/// Get a channel's root messages
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
    Query(params): Query<MessageQueryParams>,
) -> Result<ApiResponse<MessagePage>, AppError> {
    let page = message_service(&state)
        .list_messages(channel_id, auth.user_id, params.try_into()?)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Get a single message
pub async fn get_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(message_id): IdPath,
) -> Result<ApiResponse<Message>, AppError> {
    let message = message_service(&state)
        .get_message(message_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(message))
}

/// Edit a message
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(message_id): IdPath,
    Json(body): Json<EditMessageRequest>,
) -> Result<ApiResponse<Message>, AppError> {
    validate(&body)?;

    let message = message_service(&state)
        .edit_message(message_id, auth.user_id, body.content)
        .await?;

    Ok(ApiResponse::ok(message))
}

/// Delete a message
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(message_id): IdPath,
) -> Result<ApiResponse<Message>, AppError> {
    let message = message_service(&state)
        .delete_message(message_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(message))
}

/// Get a thread root and its replies
pub async fn get_thread(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(root_id): IdPath,
    Query(params): Query<MessageQueryParams>,
) -> Result<ApiResponse<ThreadPage>, AppError> {
    let page = message_service(&state)
        .list_thread(root_id, auth.user_id, params.try_into()?)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Pin a message in its channel or thread
pub async fn pin_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(message_id): IdPath,
    Query(params): Query<PinQueryParams>,
) -> Result<ApiResponse<Message>, AppError> {
    let message = message_service(&state)
        .pin_message(message_id, auth.user_id, params.scope)
        .await?;
    Ok(ApiResponse::ok(message))
}

/// Unpin a message
pub async fn unpin_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(message_id): IdPath,
    Query(params): Query<PinQueryParams>,
) -> Result<ApiResponse<Message>, AppError> {
    let message = message_service(&state)
        .unpin_message(message_id, auth.user_id, params.scope)
        .await?;
    Ok(ApiResponse::ok(message))
}

/// Messages pinned to a channel
pub async fn get_channel_pins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
) -> Result<ApiResponse<Vec<Message>>, AppError> {
    let pins = message_service(&state)
        .list_pinned(channel_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(pins))
}

/// Replies pinned within a thread
pub async fn get_thread_pins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(root_id): IdPath,
) -> Result<ApiResponse<Vec<Message>>, AppError> {
    let pins = message_service(&state)
        .list_thread_pinned(root_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(pins))
}

/// Advance the caller's read cursor
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
    body: Option<Json<MarkReadRequest>>,
) -> Result<ApiResponse<ReadState>, AppError> {
    let at = body.and_then(|Json(b)| b.at);
    let read_state = message_service(&state)
        .mark_read(channel_id, auth.user_id, at)
        .await?;
    Ok(ApiResponse::ok(read_state))
}

/// The caller's unread count for one channel
pub async fn get_unread(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(channel_id): IdPath,
) -> Result<ApiResponse<UnreadCount>, AppError> {
    let unread = message_service(&state)
        .unread_count(channel_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(unread))
}
