//! Per-user read cursor for a channel.
//!
//! Maps to the `channel_read_states` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maps to the `channel_read_states` table:
/// - user_id: BIGINT NOT NULL (composite PK)
/// - channel_id: BIGINT NOT NULL REFERENCES channels(id) ON DELETE CASCADE (composite PK)
/// - last_read_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadState {
    pub user_id: i64,
    pub channel_id: i64,
    pub last_read_at: DateTime<Utc>,
}

/// Unread messages in one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub channel_id: i64,
    pub count: i64,
    pub last_read_at: Option<DateTime<Utc>>,
}

/// Repository trait for read cursors.
#[async_trait]
pub trait ReadStateRepository: Send + Sync {
    async fn find(&self, user_id: i64, channel_id: i64) -> Result<Option<ReadState>, AppError>;

    /// Read cursors of a user for the given channels.
    async fn find_for_channels(
        &self,
        user_id: i64,
        channel_ids: &[i64],
    ) -> Result<Vec<ReadState>, AppError>;

    /// Move the cursor to `at`, never backwards. Returns the stored cursor.
    async fn advance(
        &self,
        user_id: i64,
        channel_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ReadState, AppError>;
}
