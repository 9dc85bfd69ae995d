//! Comment Repository Implementation
//!
//! Forum comments. The post's `comment_count` moves with inserts and first
//! deletes inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Comment, CommentRepository};
use crate::shared::error::AppError;

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, parent_id, depth, body, edited_at, deleted_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    parent_id: Option<i64>,
    depth: i16,
    body: String,
    edited_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            post_id: self.post_id,
            author_id: self.author_id,
            parent_id: self.parent_id,
            depth: self.depth,
            body: self.body,
            edited_at: self.edited_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL comment repository implementation.
#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let sql = format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS);
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_comment()))
    }

    async fn find_by_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = $1 ORDER BY id ASC",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_comment()).collect())
    }

    async fn create(&self, comment: &Comment) -> Result<Comment, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO comments (id, post_id, author_id, parent_id, depth, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            COMMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(comment.id)
            .bind(comment.post_id)
            .bind(comment.author_id)
            .bind(comment.parent_id)
            .bind(comment.depth)
            .bind(&comment.body)
            .bind(comment.created_at)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(comment.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into_comment())
    }

    async fn update_body(&self, id: i64, body: &str) -> Result<Comment, AppError> {
        let sql = format!(
            "UPDATE comments SET body = $2, edited_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            COMMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(body)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_comment())
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    async fn soft_delete(&self, id: i64) -> Result<(Comment, bool), AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE comments SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            COMMENT_COLUMNS
        );
        let deleted = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(deleted) = deleted else {
            tx.rollback().await?;
            let existing = self
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))?;
            return Ok((existing, false));
        };

        sqlx::query("UPDATE posts SET comment_count = GREATEST(comment_count - 1, 0) WHERE id = $1")
            .bind(deleted.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((deleted.into_comment(), true))
    }
}
