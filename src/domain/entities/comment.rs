//! Forum comment entity and repository trait.
//!
//! Maps to the `comments` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Deepest allowed comment nesting.
pub const MAX_COMMENT_DEPTH: i16 = 8;

/// Maps to the `comments` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - post_id: BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - parent_id: BIGINT NULL REFERENCES comments(id)
/// - depth: SMALLINT NOT NULL DEFAULT 0
/// - body: TEXT NOT NULL
/// - edited_at / deleted_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub depth: i16,
    pub body: String,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Repository trait for Comment data access operations.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, AppError>;

    /// All comments of a post in creation order, deleted ones included.
    async fn find_by_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError>;

    /// Insert and increment the post's comment count atomically.
    async fn create(&self, comment: &Comment) -> Result<Comment, AppError>;

    async fn update_body(&self, id: i64, body: &str) -> Result<Comment, AppError>;

    /// Soft delete and decrement the post's comment count once.
    ///
    /// Returns the comment and whether it was newly deleted.
    async fn soft_delete(&self, id: i64) -> Result<(Comment, bool), AppError>;
}
