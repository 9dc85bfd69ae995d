//! Message Repository Implementation
//!
//! PostgreSQL implementation of message operations with keyset pagination.
//! Reply counters on thread roots are maintained in the same transaction
//! as the reply insert or delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{DeleteOutcome, Message, MessageRepository, PinScope};
use crate::shared::error::AppError;

const MESSAGE_COLUMNS: &str = "id, channel_id, author_id, content, reply_to_id, thread_root_id, \
     depth, reply_count, pinned_in_channel, pinned_in_thread, edited_at, deleted_at, created_at";

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    channel_id: i64,
    author_id: i64,
    content: String,
    reply_to_id: Option<i64>,
    thread_root_id: Option<i64>,
    depth: i16,
    reply_count: i32,
    pinned_in_channel: bool,
    pinned_in_thread: bool,
    edited_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            author_id: self.author_id,
            content: self.content,
            reply_to_id: self.reply_to_id,
            thread_root_id: self.thread_root_id,
            depth: self.depth,
            reply_count: self.reply_count,
            pinned_in_channel: self.pinned_in_channel,
            pinned_in_thread: self.pinned_in_thread,
            edited_at: self.edited_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
        }
    }
}

fn pin_column(scope: PinScope) -> &'static str {
    match scope {
        PinScope::Channel => "pinned_in_channel",
        PinScope::Thread => "pinned_in_thread",
    }
}

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self, sql: &str, key: i64, cursor: Option<i64>, limit: i32) -> Result<Vec<Message>, AppError> {
        let mut query = sqlx::query_as::<_, MessageRow>(sql).bind(key);
        if let Some(cursor) = cursor {
            query = query.bind(cursor);
        }
        let rows = query.bind(i64::from(limit.max(1))).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let sql = format!("SELECT {} FROM messages WHERE id = $1", MESSAGE_COLUMNS);
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn find_roots(
        &self,
        channel_id: i64,
        before: Option<i64>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Message>, AppError> {
        // Deleted roots stay listed only as placeholders for their replies.
        let visible = "thread_root_id IS NULL AND (deleted_at IS NULL OR reply_count > 0)";

        let (sql, cursor) = match (before, after) {
            (Some(before_id), _) => (
                format!(
                    "SELECT {} FROM messages WHERE channel_id = $1 AND {} AND id < $2 \
                     ORDER BY id DESC LIMIT $3",
                    MESSAGE_COLUMNS, visible
                ),
                Some(before_id),
            ),
            (None, Some(after_id)) => (
                format!(
                    "SELECT {} FROM messages WHERE channel_id = $1 AND {} AND id > $2 \
                     ORDER BY id ASC LIMIT $3",
                    MESSAGE_COLUMNS, visible
                ),
                Some(after_id),
            ),
            (None, None) => (
                format!(
                    "SELECT {} FROM messages WHERE channel_id = $1 AND {} \
                     ORDER BY id DESC LIMIT $2",
                    MESSAGE_COLUMNS, visible
                ),
                None,
            ),
        };

        self.fetch_all(&sql, channel_id, cursor, limit).await
    }

    async fn find_replies(
        &self,
        root_id: i64,
        before: Option<i64>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Message>, AppError> {
        let (sql, cursor) = match (before, after) {
            (Some(before_id), _) => (
                format!(
                    "SELECT {} FROM messages WHERE thread_root_id = $1 AND id < $2 \
                     ORDER BY id DESC LIMIT $3",
                    MESSAGE_COLUMNS
                ),
                Some(before_id),
            ),
            (None, Some(after_id)) => (
                format!(
                    "SELECT {} FROM messages WHERE thread_root_id = $1 AND id > $2 \
                     ORDER BY id ASC LIMIT $3",
                    MESSAGE_COLUMNS
                ),
                Some(after_id),
            ),
            (None, None) => (
                format!(
                    "SELECT {} FROM messages WHERE thread_root_id = $1 ORDER BY id ASC LIMIT $2",
                    MESSAGE_COLUMNS
                ),
                None,
            ),
        };

        self.fetch_all(&sql, root_id, cursor, limit).await
    }

    async fn find_pinned_in_channel(&self, channel_id: i64) -> Result<Vec<Message>, AppError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE channel_id = $1 AND pinned_in_channel = TRUE \
             ORDER BY id DESC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn find_pinned_in_thread(&self, root_id: i64) -> Result<Vec<Message>, AppError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE thread_root_id = $1 AND pinned_in_thread = TRUE \
             ORDER BY id ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(root_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let sql = format!(
            "INSERT INTO messages (id, channel_id, author_id, content, reply_to_id, thread_root_id, \
             depth, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message.id)
            .bind(message.channel_id)
            .bind(message.author_id)
            .bind(&message.content)
            .bind(message.reply_to_id)
            .bind(message.thread_root_id)
            .bind(message.depth)
            .bind(message.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into_message())
    }

    async fn create_reply(&self, message: &Message) -> Result<(Message, i32), AppError> {
        let root_id = message
            .thread_root_id
            .ok_or_else(|| AppError::Internal("Reply without a thread root".into()))?;

        let mut tx = self.pool.begin().await?;

        let reply_count: Option<i32> = sqlx::query_scalar(
            "UPDATE messages SET reply_count = reply_count + 1 WHERE id = $1 RETURNING reply_count",
        )
        .bind(root_id)
        .fetch_optional(&mut *tx)
        .await?;
        let reply_count =
            reply_count.ok_or_else(|| AppError::NotFound(format!("Message {} not found", root_id)))?;

        let sql = format!(
            "INSERT INTO messages (id, channel_id, author_id, content, reply_to_id, thread_root_id, \
             depth, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message.id)
            .bind(message.channel_id)
            .bind(message.author_id)
            .bind(&message.content)
            .bind(message.reply_to_id)
            .bind(root_id)
            .bind(message.depth)
            .bind(message.created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((row.into_message(), reply_count))
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Message, AppError> {
        let sql = format!(
            "UPDATE messages SET content = $2, edited_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_message())
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    async fn soft_delete(&self, id: i64) -> Result<DeleteOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: two concurrent deletes must decrement the root once.
        let sql = format!("SELECT {} FROM messages WHERE id = $1 FOR UPDATE", MESSAGE_COLUMNS);
        let current = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?
            .into_message();

        if current.is_deleted() {
            tx.commit().await?;
            return Ok(DeleteOutcome {
                message: current,
                newly_deleted: false,
                root_reply_count: None,
            });
        }

        let sql = format!(
            "UPDATE messages SET content = '', pinned_in_channel = FALSE, pinned_in_thread = FALSE, \
             deleted_at = NOW() WHERE id = $1 RETURNING {}",
            MESSAGE_COLUMNS
        );
        let deleted = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
            .into_message();

        let root_reply_count = match deleted.thread_root_id {
            Some(root_id) => sqlx::query_scalar::<_, i32>(
                "UPDATE messages SET reply_count = GREATEST(reply_count - 1, 0) \
                 WHERE id = $1 RETURNING reply_count",
            )
            .bind(root_id)
            .fetch_optional(&mut *tx)
            .await?,
            None => None,
        };

        tx.commit().await?;
        Ok(DeleteOutcome {
            message: deleted,
            newly_deleted: true,
            root_reply_count,
        })
    }

    async fn set_pinned(&self, id: i64, scope: PinScope, pinned: bool) -> Result<Message, AppError> {
        let sql = format!(
            "UPDATE messages SET {} = $2 WHERE id = $1 RETURNING {}",
            pin_column(scope),
            MESSAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .bind(pinned)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_message())
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    async fn count_unread(
        &self,
        channel_id: i64,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE channel_id = $1
              AND author_id <> $2
              AND deleted_at IS NULL
              AND created_at > $3
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
