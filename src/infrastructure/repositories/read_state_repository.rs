//! Read State Repository Implementation
//!
//! Per-user channel read cursors. The cursor only moves forward.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ReadState, ReadStateRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ReadStateRow {
    user_id: i64,
    channel_id: i64,
    last_read_at: DateTime<Utc>,
}

impl From<ReadStateRow> for ReadState {
    fn from(row: ReadStateRow) -> Self {
        Self {
            user_id: row.user_id,
            channel_id: row.channel_id,
            last_read_at: row.last_read_at,
        }
    }
}

/// PostgreSQL read state repository implementation.
#[derive(Clone)]
pub struct PgReadStateRepository {
    pool: PgPool,
}

impl PgReadStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadStateRepository for PgReadStateRepository {
    async fn find(&self, user_id: i64, channel_id: i64) -> Result<Option<ReadState>, AppError> {
        let row = sqlx::query_as::<_, ReadStateRow>(
            r#"
            SELECT user_id, channel_id, last_read_at
            FROM channel_read_states
            WHERE user_id = $1 AND channel_id = $2
            "#,
        )
        .bind(user_id)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ReadState::from))
    }

    async fn find_for_channels(
        &self,
        user_id: i64,
        channel_ids: &[i64],
    ) -> Result<Vec<ReadState>, AppError> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ReadStateRow>(
            r#"
            SELECT user_id, channel_id, last_read_at
            FROM channel_read_states
            WHERE user_id = $1 AND channel_id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(channel_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReadState::from).collect())
    }

    async fn advance(
        &self,
        user_id: i64,
        channel_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ReadState, AppError> {
        let row = sqlx::query_as::<_, ReadStateRow>(
            r#"
            INSERT INTO channel_read_states (user_id, channel_id, last_read_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, channel_id) DO UPDATE
            SET last_read_at = GREATEST(channel_read_states.last_read_at, EXCLUDED.last_read_at)
            RETURNING user_id, channel_id, last_read_at
            "#,
        )
        .bind(user_id)
        .bind(channel_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
