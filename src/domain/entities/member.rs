//! Community Member entity and repository trait.
//!
//! Maps to the `community_members` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Membership role within a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    #[default]
    Member,
    Moderator,
    Owner,
}

impl MemberRole {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "owner" => Self::Owner,
            "moderator" => Self::Moderator,
            _ => Self::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Owner => "owner",
        }
    }
}

/// Membership lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    #[default]
    Active,
    /// Waiting for approval in a private community
    Pending,
    Banned,
}

impl MemberStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "banned" => Self::Banned,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Banned => "banned",
        }
    }
}

/// Represents a user's membership in a community.
///
/// Maps to the `community_members` table:
/// - community_id: BIGINT NOT NULL REFERENCES communities(id) (composite PK)
/// - user_id: BIGINT NOT NULL REFERENCES users(id) (composite PK)
/// - role: TEXT NOT NULL DEFAULT 'member'
/// - status: TEXT NOT NULL DEFAULT 'active'
/// - joined_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub community_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// Create an active member with the plain member role.
    pub fn new(community_id: i64, user_id: i64) -> Self {
        Self {
            community_id,
            user_id,
            role: MemberRole::Member,
            status: MemberStatus::Active,
            joined_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_owner(&self) -> bool {
        self.is_active() && self.role == MemberRole::Owner
    }

    /// Owners and moderators.
    pub fn is_moderator(&self) -> bool {
        self.is_active() && self.role >= MemberRole::Moderator
    }
}

/// Repository trait for Member data access operations.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find a membership row regardless of status.
    async fn find(&self, community_id: i64, user_id: i64) -> Result<Option<Member>, AppError>;

    /// Members of a community ordered by user id, keyset paginated.
    async fn find_by_community(
        &self,
        community_id: i64,
        status: Option<MemberStatus>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Member>, AppError>;

    /// Active memberships of a user.
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Member>, AppError>;

    async fn create(&self, member: &Member) -> Result<Member, AppError>;

    /// Update role and status.
    async fn update(&self, member: &Member) -> Result<Member, AppError>;

    async fn delete(&self, community_id: i64, user_id: i64) -> Result<(), AppError>;

    async fn count_active(&self, community_id: i64) -> Result<i64, AppError>;
}
