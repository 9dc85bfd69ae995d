//! Community entity and repository trait.
//!
//! Maps to the `communities` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Channel;
use crate::shared::error::AppError;

/// Who may join without approval.
///
/// Stored as TEXT with a CHECK constraint (`'public' | 'private'`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Anyone may join immediately
    #[default]
    Public,
    /// Join requests wait for moderator approval
    Private,
}

impl Visibility {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "private" => Self::Private,
            _ => Self::Public,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Represents a community.
///
/// Maps to the `communities` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - slug: VARCHAR(48) NOT NULL UNIQUE
/// - name: VARCHAR(100) NOT NULL
/// - description: TEXT NULL
/// - visibility: TEXT NOT NULL DEFAULT 'public'
/// - owner_id: BIGINT NOT NULL REFERENCES users(id)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for Community data access operations.
#[async_trait]
pub trait CommunityRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Community>, AppError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Community>, AppError>;

    /// Communities the user is an active member of.
    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Community>, AppError>;

    /// Insert the community together with its owner membership and its
    /// default channel, all or nothing.
    async fn create(&self, community: &Community, general: &Channel) -> Result<Community, AppError>;

    async fn update(&self, community: &Community) -> Result<Community, AppError>;

    /// Hard delete; channels, posts, documents and events cascade.
    async fn delete(&self, id: i64) -> Result<(), AppError>;
}
