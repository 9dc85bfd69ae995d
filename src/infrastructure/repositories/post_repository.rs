//! Post Repository Implementation
//!
//! Forum posts and votes. Vote tallies on the post row change in the same
//! transaction as the vote itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    Post, PostRepository, PostSort, VoteDelta, VoteValue, HOT_RANK_DECAY_SECONDS,
};
use crate::shared::error::AppError;

const POST_COLUMNS: &str = "id, community_id, author_id, title, body, score, upvotes, downvotes, \
     comment_count, locked, pinned, edited_at, deleted_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i64,
    community_id: i64,
    author_id: i64,
    title: String,
    body: String,
    score: i32,
    upvotes: i32,
    downvotes: i32,
    comment_count: i32,
    locked: bool,
    pinned: bool,
    edited_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PostRow {
    fn into_post(self) -> Post {
        Post {
            id: self.id,
            community_id: self.community_id,
            author_id: self.author_id,
            title: self.title,
            body: self.body,
            score: self.score,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            comment_count: self.comment_count,
            locked: self.locked,
            pinned: self.pinned,
            edited_at: self.edited_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
        }
    }
}

/// ORDER BY clause for a listing; pinned posts always lead.
fn order_clause(sort: PostSort) -> String {
    match sort {
        PostSort::Hot => format!(
            "pinned DESC, SIGN(score) * LOG(GREATEST(ABS(score), 1)) \
             + EXTRACT(EPOCH FROM created_at) / {} DESC, id DESC",
            HOT_RANK_DECAY_SECONDS
        ),
        PostSort::New => "pinned DESC, id DESC".to_string(),
        PostSort::Top => "pinned DESC, score DESC, id DESC".to_string(),
    }
}

/// PostgreSQL post repository implementation.
#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, AppError> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_post()))
    }

    async fn find_by_community(
        &self,
        community_id: i64,
        sort: PostSort,
        offset: i64,
        limit: i32,
    ) -> Result<Vec<Post>, AppError> {
        let sql = format!(
            "SELECT {} FROM posts WHERE community_id = $1 AND deleted_at IS NULL \
             ORDER BY {} OFFSET $2 LIMIT $3",
            POST_COLUMNS,
            order_clause(sort)
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(community_id)
            .bind(offset.max(0))
            .bind(i64::from(limit.max(1)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_post()).collect())
    }

    async fn create(&self, post: &Post) -> Result<Post, AppError> {
        let sql = format!(
            "INSERT INTO posts (id, community_id, author_id, title, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post.id)
            .bind(post.community_id)
            .bind(post.author_id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into_post())
    }

    async fn update(&self, post: &Post) -> Result<Post, AppError> {
        let sql = format!(
            "UPDATE posts SET title = $2, body = $3, locked = $4, pinned = $5, edited_at = $6 \
             WHERE id = $1 RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.locked)
            .bind(post.pinned)
            .bind(post.edited_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_post())
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post.id)))
    }

    async fn soft_delete(&self, id: i64) -> Result<Post, AppError> {
        let sql = format!(
            "UPDATE posts SET deleted_at = COALESCE(deleted_at, NOW()) WHERE id = $1 RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_post())
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    async fn find_vote(&self, post_id: i64, user_id: i64) -> Result<VoteValue, AppError> {
        let value: Option<i16> =
            sqlx::query_scalar("SELECT value FROM post_votes WHERE post_id = $1 AND user_id = $2")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.map_or(VoteValue::None, VoteValue::from_i16))
    }

    async fn set_vote(
        &self,
        post_id: i64,
        user_id: i64,
        value: VoteValue,
    ) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serialize votes on the same post so the tally stays exact.
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        let previous: Option<i16> =
            sqlx::query_scalar("SELECT value FROM post_votes WHERE post_id = $1 AND user_id = $2")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let previous = previous.map_or(VoteValue::None, VoteValue::from_i16);

        let delta = VoteDelta::between(previous, value);
        if !delta.is_zero() {
            match value {
                VoteValue::None => {
                    sqlx::query("DELETE FROM post_votes WHERE post_id = $1 AND user_id = $2")
                        .bind(post_id)
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await?;
                }
                _ => {
                    sqlx::query(
                        r#"
                        INSERT INTO post_votes (post_id, user_id, value)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (post_id, user_id) DO UPDATE SET value = EXCLUDED.value
                        "#,
                    )
                    .bind(post_id)
                    .bind(user_id)
                    .bind(value.as_i16())
                    .execute(&mut *tx)
                    .await?;
                }
            }

            sqlx::query(
                r#"
                UPDATE posts
                SET upvotes = upvotes + $2, downvotes = downvotes + $3, score = score + $4
                WHERE id = $1
                "#,
            )
            .bind(post_id)
            .bind(delta.upvotes)
            .bind(delta.downvotes)
            .bind(delta.score())
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into_post())
    }
}
