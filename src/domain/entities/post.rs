//! Forum post and vote entities with the repository trait.
//!
//! Maps to the `posts` and `post_votes` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A user's vote on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Up,
    Down,
    /// No vote; clears an existing one
    #[default]
    None,
}

impl VoteValue {
    /// Database value: +1, -1, or no row.
    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
            Self::None => 0,
        }
    }

    pub fn from_i16(v: i16) -> Self {
        match v {
            1 => Self::Up,
            -1 => Self::Down,
            _ => Self::None,
        }
    }
}

/// Change to a post's tally when a user's vote moves from `old` to `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteDelta {
    pub upvotes: i32,
    pub downvotes: i32,
}

impl VoteDelta {
    pub fn between(old: VoteValue, new: VoteValue) -> Self {
        let count = |v: VoteValue| match v {
            VoteValue::Up => (1, 0),
            VoteValue::Down => (0, 1),
            VoteValue::None => (0, 0),
        };
        let (old_up, old_down) = count(old);
        let (new_up, new_down) = count(new);
        Self {
            upvotes: new_up - old_up,
            downvotes: new_down - old_down,
        }
    }

    pub fn score(&self) -> i32 {
        self.upvotes - self.downvotes
    }

    pub fn is_zero(&self) -> bool {
        self.upvotes == 0 && self.downvotes == 0
    }
}

/// Listing order for posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    Hot,
    New,
    Top,
}

impl PostSort {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hot" => Some(Self::Hot),
            "new" => Some(Self::New),
            "top" => Some(Self::Top),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::New => "new",
            Self::Top => "top",
        }
    }
}

/// Divisor turning post age into rank: one order of magnitude of score
/// is worth 12.5 hours of recency.
pub const HOT_RANK_DECAY_SECONDS: f64 = 45_000.0;

/// Hot ranking: `sign(score) * log10(max(|score|, 1)) + epoch_seconds / 45000`.
pub fn hot_rank(score: i32, created_at: DateTime<Utc>) -> f64 {
    let magnitude = (score.unsigned_abs().max(1) as f64).log10();
    let sign = f64::from(score.signum());
    sign * magnitude + created_at.timestamp() as f64 / HOT_RANK_DECAY_SECONDS
}

/// Represents a forum post.
///
/// Maps to the `posts` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - community_id: BIGINT NOT NULL REFERENCES communities(id) ON DELETE CASCADE
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - title: VARCHAR(300) NOT NULL
/// - body: TEXT NOT NULL DEFAULT ''
/// - score / upvotes / downvotes / comment_count: INTEGER NOT NULL DEFAULT 0
/// - locked / pinned: BOOLEAN NOT NULL DEFAULT FALSE
/// - edited_at / deleted_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub community_id: i64,
    pub author_id: i64,
    pub title: String,
    pub body: String,
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub comment_count: i32,
    pub locked: bool,
    pub pinned: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Votes and comments are rejected on locked or deleted posts.
    pub fn accepts_interaction(&self) -> bool {
        !self.locked && !self.is_deleted()
    }

    pub fn hot_rank(&self) -> f64 {
        hot_rank(self.score, self.created_at)
    }
}

/// Repository trait for Post and PostVote data access operations.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, AppError>;

    /// Non-deleted posts of a community; pinned posts first, then by `sort`.
    async fn find_by_community(
        &self,
        community_id: i64,
        sort: PostSort,
        offset: i64,
        limit: i32,
    ) -> Result<Vec<Post>, AppError>;

    async fn create(&self, post: &Post) -> Result<Post, AppError>;

    /// Persist title, body, lock and pin flags.
    async fn update(&self, post: &Post) -> Result<Post, AppError>;

    async fn soft_delete(&self, id: i64) -> Result<Post, AppError>;

    /// The user's current vote.
    async fn find_vote(&self, post_id: i64, user_id: i64) -> Result<VoteValue, AppError>;

    /// Replace the user's vote and apply the tally delta in one transaction.
    async fn set_vote(
        &self,
        post_id: i64,
        user_id: i64,
        value: VoteValue,
    ) -> Result<Post, AppError>;
}
