//! Message Service
//!
//! Chat messages, two-level threads, pins and read cursors.
//!
//! Every mutation is published on `channel:{id}`; replies are also
//! published on `thread:{root_id}` so open thread views stay current.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::notifier::Notifier;
use crate::domain::events::{channels, RealtimeEvent};
use crate::domain::services::{place_reply, PermissionService, ThreadError};
use crate::domain::{
    Channel, ChannelRepository, Member, MemberRepository, Message, MessageRepository, PinScope,
    ReadState, ReadStateRepository, UnreadCount, MAX_MESSAGE_LENGTH,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

pub const DEFAULT_PAGE_SIZE: i32 = 50;
pub const MAX_PAGE_SIZE: i32 = 100;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Post a root message, or a reply when `reply_to` is set
    async fn send_message(
        &self,
        channel_id: i64,
        author_id: i64,
        request: CreateMessageDto,
    ) -> Result<Message, MessageError>;

    async fn get_message(&self, message_id: i64, actor_id: i64) -> Result<Message, MessageError>;

    /// Edit content (author only)
    async fn edit_message(&self, message_id: i64, actor_id: i64, content: String) -> Result<Message, MessageError>;

    /// Soft delete (author or moderator). Idempotent.
    async fn delete_message(&self, message_id: i64, actor_id: i64) -> Result<Message, MessageError>;

    /// Root messages, newest first
    async fn list_messages(
        &self,
        channel_id: i64,
        actor_id: i64,
        query: MessageQueryDto,
    ) -> Result<MessagePage, MessageError>;

    /// Replies of a thread, oldest first
    async fn list_thread(
        &self,
        root_id: i64,
        actor_id: i64,
        query: MessageQueryDto,
    ) -> Result<ThreadPage, MessageError>;

    async fn pin_message(&self, message_id: i64, actor_id: i64, scope: PinScope) -> Result<Message, MessageError>;

    async fn unpin_message(&self, message_id: i64, actor_id: i64, scope: PinScope) -> Result<Message, MessageError>;

    async fn list_pinned(&self, channel_id: i64, actor_id: i64) -> Result<Vec<Message>, MessageError>;

    async fn list_thread_pinned(&self, root_id: i64, actor_id: i64) -> Result<Vec<Message>, MessageError>;

    /// Move the read cursor forward to `at` (default now)
    async fn mark_read(
        &self,
        channel_id: i64,
        user_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<ReadState, MessageError>;

    async fn unread_count(&self, channel_id: i64, user_id: i64) -> Result<UnreadCount, MessageError>;
}

/// Create message request
#[derive(Debug, Clone)]
pub struct CreateMessageDto {
    pub content: String,
    pub reply_to: Option<i64>,
}

/// Keyset pagination query
#[derive(Debug, Clone, Default)]
pub struct MessageQueryDto {
    pub before: Option<i64>,
    pub after: Option<i64>,
    pub limit: Option<i32>,
}

impl MessageQueryDto {
    pub fn limit(&self) -> i32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// A page of root messages
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// A thread root and a page of its replies
#[derive(Debug, Clone, Serialize)]
pub struct ThreadPage {
    pub root: Message,
    pub replies: Vec<Message>,
    pub has_more: bool,
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Channel not found")]
    ChannelNotFound,

    #[error("Message not found")]
    NotFound,

    #[error("Reply target not found")]
    ParentNotFound,

    #[error("Message is not a thread root")]
    NotThreadRoot,

    #[error("Only replies can be pinned in a thread")]
    NotAReply,

    #[error("Message has been deleted")]
    Deleted,

    #[error("Channel is archived")]
    ChannelArchived,

    #[error("Message content cannot be empty")]
    EmptyContent,

    #[error("Message content exceeds {MAX_MESSAGE_LENGTH} characters")]
    ContentTooLong,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<MessageError> for AppError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::ChannelNotFound | MessageError::NotFound | MessageError::ParentNotFound => {
                AppError::NotFound(e.to_string())
            }
            MessageError::Forbidden | MessageError::ChannelArchived => {
                AppError::Forbidden(e.to_string())
            }
            MessageError::EmptyContent | MessageError::ContentTooLong => {
                AppError::Validation(e.to_string())
            }
            MessageError::NotThreadRoot
            | MessageError::NotAReply
            | MessageError::Deleted
            | MessageError::Thread(_) => AppError::BadRequest(e.to_string()),
            MessageError::Repository(inner) => inner,
        }
    }
}

/// Reject blank or oversized content.
pub fn check_content(content: &str) -> Result<(), MessageError> {
    if content.trim().is_empty() {
        return Err(MessageError::EmptyContent);
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(MessageError::ContentTooLong);
    }
    Ok(())
}

/// Start of the unread range: the read cursor, or the join time when the
/// user never opened the channel.
pub fn unread_since(state: Option<&ReadState>, member: &Member) -> DateTime<Utc> {
    state.map(|s| s.last_read_at).unwrap_or(member.joined_at)
}

/// Broker channels a message event goes to.
fn message_channels(message: &Message) -> Vec<String> {
    let mut names = vec![channels::channel(message.channel_id)];
    if let Some(root_id) = message.thread_root_id {
        names.push(channels::thread(root_id));
    }
    names
}

/// Split an over-fetched page into items and a has-more flag.
fn take_page(mut messages: Vec<Message>, limit: i32) -> (Vec<Message>, bool) {
    let limit = limit as usize;
    let has_more = messages.len() > limit;
    messages.truncate(limit);
    (messages, has_more)
}

/// MessageService implementation
pub struct MessageServiceImpl<Ch, M, Msg, R>
where
    Ch: ChannelRepository,
    M: MemberRepository,
    Msg: MessageRepository,
    R: ReadStateRepository,
{
    channel_repo: Arc<Ch>,
    member_repo: Arc<M>,
    message_repo: Arc<Msg>,
    read_state_repo: Arc<R>,
    id_generator: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl<Ch, M, Msg, R> MessageServiceImpl<Ch, M, Msg, R>
where
    Ch: ChannelRepository,
    M: MemberRepository,
    Msg: MessageRepository,
    R: ReadStateRepository,
{
    pub fn new(
        channel_repo: Arc<Ch>,
        member_repo: Arc<M>,
        message_repo: Arc<Msg>,
        read_state_repo: Arc<R>,
        id_generator: Arc<SnowflakeGenerator>,
        notifier: Notifier,
    ) -> Self {
        Self {
            channel_repo,
            member_repo,
            message_repo,
            read_state_repo,
            id_generator,
            notifier,
        }
    }

    async fn load_channel(&self, channel_id: i64) -> Result<Channel, MessageError> {
        self.channel_repo
            .find_by_id(channel_id)
            .await?
            .ok_or(MessageError::ChannelNotFound)
    }

    async fn load_message(&self, message_id: i64) -> Result<Message, MessageError> {
        self.message_repo
            .find_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)
    }

    /// Membership row of the actor in the channel's community, which must be active.
    async fn require_member(&self, channel: &Channel, user_id: i64) -> Result<Member, MessageError> {
        let member = self.member_repo.find(channel.community_id, user_id).await?;
        match member {
            Some(m) if m.is_active() => Ok(m),
            _ => Err(MessageError::Forbidden),
        }
    }

    /// Load a message, its channel and the actor's membership.
    async fn load_with_access(
        &self,
        message_id: i64,
        actor_id: i64,
    ) -> Result<(Message, Channel, Member), MessageError> {
        let message = self.load_message(message_id).await?;
        let channel = self.load_channel(message.channel_id).await?;
        let member = self.require_member(&channel, actor_id).await?;
        Ok((message, channel, member))
    }

    async fn load_root(&self, root_id: i64) -> Result<Message, MessageError> {
        let root = self.load_message(root_id).await?;
        if !root.is_root() {
            return Err(MessageError::NotThreadRoot);
        }
        Ok(root)
    }

    async fn set_pin(
        &self,
        message_id: i64,
        actor_id: i64,
        scope: PinScope,
        pinned: bool,
    ) -> Result<Message, MessageError> {
        let (message, _channel, member) = self.load_with_access(message_id, actor_id).await?;

        let allowed = match scope {
            PinScope::Channel => PermissionService::can_pin_in_channel(Some(&member)),
            PinScope::Thread => {
                let root_id = message.thread_root_id.ok_or(MessageError::NotAReply)?;
                let root = self.load_message(root_id).await?;
                PermissionService::can_pin_in_thread(root.author_id, actor_id, Some(&member))
            }
        };
        if !allowed {
            return Err(MessageError::Forbidden);
        }

        if message.is_pinned(scope) == pinned {
            return Ok(message);
        }
        if pinned && message.is_deleted() {
            return Err(MessageError::Deleted);
        }

        let updated = self.message_repo.set_pinned(message_id, scope, pinned).await?;

        tracing::debug!(
            message_id,
            actor_id,
            scope = scope.as_str(),
            pinned,
            "Message pin changed"
        );

        let event = if pinned {
            RealtimeEvent::MessagePinned {
                message: updated.clone(),
                scope,
            }
        } else {
            RealtimeEvent::MessageUnpinned {
                message: updated.clone(),
                scope,
            }
        };
        self.notifier.publish(&message_channels(&updated), event).await;

        Ok(updated)
    }

    async fn publish_reply_count(&self, channel_id: i64, root_id: i64, reply_count: i32) {
        self.notifier
            .publish(
                &[channels::channel(channel_id), channels::thread(root_id)],
                RealtimeEvent::ThreadReplyCount {
                    channel_id,
                    root_id,
                    reply_count,
                },
            )
            .await;
    }
}

#[async_trait]
impl<Ch, M, Msg, R> MessageService for MessageServiceImpl<Ch, M, Msg, R>
where
    Ch: ChannelRepository + 'static,
    M: MemberRepository + 'static,
    Msg: MessageRepository + 'static,
    R: ReadStateRepository + 'static,
{
    async fn send_message(
        &self,
        channel_id: i64,
        author_id: i64,
        request: CreateMessageDto,
    ) -> Result<Message, MessageError> {
        let channel = self.load_channel(channel_id).await?;
        self.require_member(&channel, author_id).await?;
        if !channel.accepts_messages() {
            return Err(MessageError::ChannelArchived);
        }
        check_content(&request.content)?;

        let message = Message::root(
            self.id_generator.generate(),
            channel_id,
            author_id,
            request.content,
        );

        let Some(parent_id) = request.reply_to else {
            let created = self.message_repo.create(&message).await?;
            tracing::debug!(message_id = created.id, channel_id, author_id, "Message sent");

            self.notifier
                .publish(
                    &[channels::channel(channel_id)],
                    RealtimeEvent::MessageCreated(created.clone()),
                )
                .await;
            return Ok(created);
        };

        let parent = self
            .message_repo
            .find_by_id(parent_id)
            .await?
            .ok_or(MessageError::ParentNotFound)?;
        let placement = place_reply(&parent, channel_id)?;

        let reply = Message {
            reply_to_id: Some(placement.reply_to_id),
            thread_root_id: Some(placement.thread_root_id),
            depth: placement.depth,
            ..message
        };
        let (created, reply_count) = self.message_repo.create_reply(&reply).await?;

        tracing::debug!(
            message_id = created.id,
            channel_id,
            author_id,
            root_id = placement.thread_root_id,
            depth = placement.depth,
            "Reply sent"
        );

        self.notifier
            .publish(
                &message_channels(&created),
                RealtimeEvent::MessageCreated(created.clone()),
            )
            .await;
        self.publish_reply_count(channel_id, placement.thread_root_id, reply_count)
            .await;

        Ok(created)
    }

    async fn get_message(&self, message_id: i64, actor_id: i64) -> Result<Message, MessageError> {
        let (message, _, _) = self.load_with_access(message_id, actor_id).await?;
        Ok(message)
    }

    async fn edit_message(&self, message_id: i64, actor_id: i64, content: String) -> Result<Message, MessageError> {
        let (message, channel, member) = self.load_with_access(message_id, actor_id).await?;

        if !PermissionService::can_edit_own(message.author_id, actor_id, Some(&member)) {
            return Err(MessageError::Forbidden);
        }
        if message.is_deleted() {
            return Err(MessageError::Deleted);
        }
        if !channel.accepts_messages() {
            return Err(MessageError::ChannelArchived);
        }
        check_content(&content)?;

        let updated = self.message_repo.update_content(message_id, &content).await?;

        self.notifier
            .publish(
                &message_channels(&updated),
                RealtimeEvent::MessageUpdated(updated.clone()),
            )
            .await;
        Ok(updated)
    }

    async fn delete_message(&self, message_id: i64, actor_id: i64) -> Result<Message, MessageError> {
        let (message, _channel, member) = self.load_with_access(message_id, actor_id).await?;

        if !PermissionService::can_delete(message.author_id, actor_id, Some(&member)) {
            return Err(MessageError::Forbidden);
        }
        if message.is_deleted() {
            return Ok(message);
        }

        let outcome = self.message_repo.soft_delete(message_id).await?;
        if !outcome.newly_deleted {
            return Ok(outcome.message);
        }

        let deleted = outcome.message;
        tracing::info!(message_id, actor_id, channel_id = deleted.channel_id, "Message deleted");

        self.notifier
            .publish(
                &message_channels(&deleted),
                RealtimeEvent::MessageDeleted(deleted.clone()),
            )
            .await;
        if let (Some(root_id), Some(count)) = (deleted.thread_root_id, outcome.root_reply_count) {
            self.publish_reply_count(deleted.channel_id, root_id, count).await;
        }

        Ok(deleted)
    }

    async fn list_messages(
        &self,
        channel_id: i64,
        actor_id: i64,
        query: MessageQueryDto,
    ) -> Result<MessagePage, MessageError> {
        let channel = self.load_channel(channel_id).await?;
        self.require_member(&channel, actor_id).await?;

        let limit = query.limit();
        let messages = self
            .message_repo
            .find_roots(channel_id, query.before, query.after, limit + 1)
            .await?;
        let (messages, has_more) = take_page(messages, limit);

        Ok(MessagePage { messages, has_more })
    }

    async fn list_thread(
        &self,
        root_id: i64,
        actor_id: i64,
        query: MessageQueryDto,
    ) -> Result<ThreadPage, MessageError> {
        let root = self.load_root(root_id).await?;
        let channel = self.load_channel(root.channel_id).await?;
        self.require_member(&channel, actor_id).await?;
        if root.is_deleted() && root.reply_count == 0 {
            return Err(MessageError::NotFound);
        }

        let limit = query.limit();
        let replies = self
            .message_repo
            .find_replies(root_id, query.before, query.after, limit + 1)
            .await?;
        let (replies, has_more) = take_page(replies, limit);

        Ok(ThreadPage {
            root,
            replies,
            has_more,
        })
    }

    async fn pin_message(&self, message_id: i64, actor_id: i64, scope: PinScope) -> Result<Message, MessageError> {
        self.set_pin(message_id, actor_id, scope, true).await
    }

    async fn unpin_message(&self, message_id: i64, actor_id: i64, scope: PinScope) -> Result<Message, MessageError> {
        self.set_pin(message_id, actor_id, scope, false).await
    }

    async fn list_pinned(&self, channel_id: i64, actor_id: i64) -> Result<Vec<Message>, MessageError> {
        let channel = self.load_channel(channel_id).await?;
        self.require_member(&channel, actor_id).await?;
        Ok(self.message_repo.find_pinned_in_channel(channel_id).await?)
    }

    async fn list_thread_pinned(&self, root_id: i64, actor_id: i64) -> Result<Vec<Message>, MessageError> {
        let root = self.load_root(root_id).await?;
        let channel = self.load_channel(root.channel_id).await?;
        self.require_member(&channel, actor_id).await?;
        Ok(self.message_repo.find_pinned_in_thread(root_id).await?)
    }

    async fn mark_read(
        &self,
        channel_id: i64,
        user_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<ReadState, MessageError> {
        let channel = self.load_channel(channel_id).await?;
        self.require_member(&channel, user_id).await?;

        let now = Utc::now();
        let at = at.map_or(now, |t| t.min(now));
        let state = self.read_state_repo.advance(user_id, channel_id, at).await?;

        self.notifier.publish_detached(
            vec![channels::user(user_id)],
            RealtimeEvent::ChannelRead {
                channel_id,
                user_id,
                last_read_at: state.last_read_at,
            },
        );
        Ok(state)
    }

    async fn unread_count(&self, channel_id: i64, user_id: i64) -> Result<UnreadCount, MessageError> {
        let channel = self.load_channel(channel_id).await?;
        let member = self.require_member(&channel, user_id).await?;

        let state = self.read_state_repo.find(user_id, channel_id).await?;
        let since = unread_since(state.as_ref(), &member);
        let count = self
            .message_repo
            .count_unread(channel_id, user_id, since)
            .await?;

        Ok(UnreadCount {
            channel_id,
            count,
            last_read_at: state.map(|s| s.last_read_at),
        })
    }
}
