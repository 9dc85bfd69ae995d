//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema. Messages form
//! two-level threads: a root (depth 0) and replies at depth 1 or 2 that all
//! point at the root through `thread_root_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maximum reply depth below a thread root.
pub const MAX_THREAD_DEPTH: i16 = 2;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Where a pin applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PinScope {
    /// Surfaced in the channel's pinned list
    #[default]
    Channel,
    /// Surfaced at the top of its thread
    Thread,
}

impl PinScope {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "channel" => Some(Self::Channel),
            "thread" => Some(Self::Thread),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Thread => "thread",
        }
    }
}

/// Represents a message in a channel.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - channel_id: BIGINT NOT NULL REFERENCES channels(id) ON DELETE CASCADE
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - content: TEXT NOT NULL (max 4000 characters, empty once deleted)
/// - reply_to_id: BIGINT NULL REFERENCES messages(id) -- direct parent
/// - thread_root_id: BIGINT NULL REFERENCES messages(id)
/// - depth: SMALLINT NOT NULL DEFAULT 0 CHECK (depth BETWEEN 0 AND 2)
/// - reply_count: INTEGER NOT NULL DEFAULT 0 -- maintained on roots only
/// - pinned_in_channel: BOOLEAN NOT NULL DEFAULT FALSE
/// - pinned_in_thread: BOOLEAN NOT NULL DEFAULT FALSE
/// - edited_at: TIMESTAMPTZ NULL
/// - deleted_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub channel_id: i64,
    pub author_id: i64,
    pub content: String,
    pub reply_to_id: Option<i64>,
    pub thread_root_id: Option<i64>,
    pub depth: i16,
    pub reply_count: i32,
    pub pinned_in_channel: bool,
    pub pinned_in_thread: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A new root message.
    pub fn root(id: i64, channel_id: i64, author_id: i64, content: String) -> Self {
        Self {
            id,
            channel_id,
            author_id,
            content,
            reply_to_id: None,
            thread_root_id: None,
            depth: 0,
            reply_count: 0,
            pinned_in_channel: false,
            pinned_in_thread: false,
            edited_at: None,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.thread_root_id.is_none()
    }

    pub fn is_reply(&self) -> bool {
        self.thread_root_id.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// The thread this message belongs to (its own id for roots).
    pub fn thread_id(&self) -> i64 {
        self.thread_root_id.unwrap_or(self.id)
    }

    /// Whether the message is pinned in the given scope.
    pub fn is_pinned(&self, scope: PinScope) -> bool {
        match scope {
            PinScope::Channel => self.pinned_in_channel,
            PinScope::Thread => self.pinned_in_thread,
        }
    }

    /// Deleted roots stay visible as placeholders while they have replies.
    pub fn is_visible_in_channel(&self) -> bool {
        self.is_root() && (!self.is_deleted() || self.reply_count > 0)
    }

    /// Content length in characters.
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }

    /// Latest modification time, used to order competing copies.
    pub fn last_modified(&self) -> DateTime<Utc> {
        [Some(self.created_at), self.edited_at, self.deleted_at]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.created_at)
    }
}

/// Result of a soft delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    /// The message after deletion.
    pub message: Message,
    /// False when the message was already deleted.
    pub newly_deleted: bool,
    /// Reply count of the thread root after the decrement, for replies.
    pub root_reply_count: Option<i32>,
}

/// Repository trait for Message data access operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Root messages in a channel with keyset pagination.
    ///
    /// - `before`: roots with id lower than this, newest first
    /// - `after`: roots with id greater than this, oldest first
    /// - neither: the latest roots, newest first
    ///
    /// Deleted roots without replies are omitted.
    async fn find_roots(
        &self,
        channel_id: i64,
        before: Option<i64>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Message>, AppError>;

    /// Replies in a thread, oldest first; with `before`, newest first
    /// walking back from the cursor.
    async fn find_replies(
        &self,
        root_id: i64,
        before: Option<i64>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Message>, AppError>;

    /// Messages pinned in the channel scope, newest first.
    async fn find_pinned_in_channel(&self, channel_id: i64) -> Result<Vec<Message>, AppError>;

    /// Replies pinned in a thread, oldest first.
    async fn find_pinned_in_thread(&self, root_id: i64) -> Result<Vec<Message>, AppError>;

    /// Insert a root message.
    async fn create(&self, message: &Message) -> Result<Message, AppError>;

    /// Insert a reply and increment its root's reply count atomically.
    ///
    /// Returns the reply and the root's new reply count.
    async fn create_reply(&self, message: &Message) -> Result<(Message, i32), AppError>;

    /// Replace content and stamp `edited_at`.
    async fn update_content(&self, id: i64, content: &str) -> Result<Message, AppError>;

    /// Soft delete: clear content and pins, stamp `deleted_at`, and for a
    /// reply decrement the root's reply count, all in one transaction.
    async fn soft_delete(&self, id: i64) -> Result<DeleteOutcome, AppError>;

    async fn set_pinned(&self, id: i64, scope: PinScope, pinned: bool) -> Result<Message, AppError>;

    /// Non-deleted messages by other authors created after `since`.
    async fn count_unread(
        &self,
        channel_id: i64,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError>;
}
