//! Channel Repository Implementation
//!
//! PostgreSQL implementation of the ChannelRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::domain::{Channel, ChannelRepository};
use crate::shared::error::AppError;

/// Database row representation of the channels table.
#[derive(Debug, sqlx::FromRow)]
struct ChannelRow {
    id: i64,
    community_id: i64,
    name: String,
    topic: Option<String>,
    event_id: Option<i64>,
    position: i32,
    archived: bool,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ChannelRow {
    fn into_channel(self) -> Channel {
        Channel {
            id: self.id,
            community_id: self.community_id,
            name: self.name,
            topic: self.topic,
            event_id: self.event_id,
            position: self.position,
            archived: self.archived,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn map_name_conflict(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Channel name already in use".into())
        }
        _ => AppError::Database(e),
    }
}

/// Insert a channel on any executor, so callers can include it in their
/// own transaction.
pub(crate) async fn insert_channel<'e>(
    executor: impl PgExecutor<'e>,
    channel: &Channel,
) -> Result<Channel, AppError> {
    let row = sqlx::query_as::<_, ChannelRow>(
        r#"
        INSERT INTO channels (id, community_id, name, topic, event_id, position, archived,
                              created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, community_id, name, topic, event_id, position, archived,
                  created_by, created_at, updated_at
        "#,
    )
    .bind(channel.id)
    .bind(channel.community_id)
    .bind(&channel.name)
    .bind(&channel.topic)
    .bind(channel.event_id)
    .bind(channel.position)
    .bind(channel.archived)
    .bind(channel.created_by)
    .bind(channel.created_at)
    .bind(channel.updated_at)
    .fetch_one(executor)
    .await
    .map_err(map_name_conflict)?;

    Ok(row.into_channel())
}

/// PostgreSQL channel repository implementation.
#[derive(Clone)]
pub struct PgChannelRepository {
    pool: PgPool,
}

impl PgChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for PgChannelRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Channel>, AppError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, community_id, name, topic, event_id, position, archived,
                   created_by, created_at, updated_at
            FROM channels
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_channel()))
    }

    async fn find_by_community(&self, community_id: i64) -> Result<Vec<Channel>, AppError> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, community_id, name, topic, event_id, position, archived,
                   created_by, created_at, updated_at
            FROM channels
            WHERE community_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_channel()).collect())
    }

    async fn find_by_event(&self, event_id: i64) -> Result<Option<Channel>, AppError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, community_id, name, topic, event_id, position, archived,
                   created_by, created_at, updated_at
            FROM channels
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_channel()))
    }

    async fn create(&self, channel: &Channel) -> Result<Channel, AppError> {
        insert_channel(&self.pool, channel).await
    }

    async fn update(&self, channel: &Channel) -> Result<Channel, AppError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            UPDATE channels
            SET name = $2, topic = $3, position = $4, archived = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, community_id, name, topic, event_id, position, archived,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(channel.id)
        .bind(&channel.name)
        .bind(&channel.topic)
        .bind(channel.position)
        .bind(channel.archived)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_name_conflict)?;

        row.map(|r| r.into_channel())
            .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", channel.id)))
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn next_position(&self, community_id: i64) -> Result<i32, AppError> {
        let position: Option<i32> =
            sqlx::query_scalar("SELECT MAX(position) FROM channels WHERE community_id = $1")
                .bind(community_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(position.map_or(0, |p| p + 1))
    }
}
