//! Channel entity and repository trait.
//!
//! Maps to the `channels` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a chat channel within a community.
///
/// Maps to the `channels` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - community_id: BIGINT NOT NULL REFERENCES communities(id) ON DELETE CASCADE
/// - name: VARCHAR(100) NOT NULL
/// - topic: TEXT NULL
/// - event_id: BIGINT NULL -- set when the channel belongs to an event
/// - position: INTEGER NOT NULL DEFAULT 0
/// - archived: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_by: BIGINT NOT NULL REFERENCES users(id)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub community_id: i64,
    pub name: String,
    pub topic: Option<String>,
    pub event_id: Option<i64>,
    pub position: i32,
    pub archived: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Whether this channel was created for an event.
    pub fn is_event_channel(&self) -> bool {
        self.event_id.is_some()
    }

    /// Archived channels are read-only.
    pub fn accepts_messages(&self) -> bool {
        !self.archived
    }
}

/// Column width of `channels.name`, in characters.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 100;

/// Normalize a channel name: trimmed, lowercase, inner whitespace as dashes,
/// cut to [`MAX_CHANNEL_NAME_LENGTH`].
pub fn normalize_channel_name(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase();
    truncate_name(&joined, MAX_CHANNEL_NAME_LENGTH)
}

/// First of `base`, `base-2`, `base-3`, ... that `taken` rejects, kept
/// within [`MAX_CHANNEL_NAME_LENGTH`].
pub fn unique_channel_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n: u32 = 2;
    loop {
        let suffix = format!("-{}", n);
        let candidate = format!(
            "{}{}",
            truncate_name(base, MAX_CHANNEL_NAME_LENGTH - suffix.len()),
            suffix
        );
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn truncate_name(name: &str, max_chars: usize) -> String {
    let cut: String = name.chars().take(max_chars).collect();
    cut.trim_end_matches('-').to_string()
}

/// Repository trait for Channel data access operations.
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Channel>, AppError>;

    /// Channels of a community ordered by position, then id.
    async fn find_by_community(&self, community_id: i64) -> Result<Vec<Channel>, AppError>;

    async fn find_by_event(&self, event_id: i64) -> Result<Option<Channel>, AppError>;

    async fn create(&self, channel: &Channel) -> Result<Channel, AppError>;

    async fn update(&self, channel: &Channel) -> Result<Channel, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    /// Next free position at the end of the community's channel list.
    async fn next_position(&self, community_id: i64) -> Result<i32, AppError>;
}
