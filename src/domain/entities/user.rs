//! User profile entity and repository trait.
//!
//! Maps to the `users` table. Accounts are provisioned by the upstream
//! identity provider; this service owns only the public profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a user's public profile.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (matches the identity provider subject)
/// - username: VARCHAR(32) NOT NULL UNIQUE
/// - display_name: VARCHAR(64) NULL
/// - bio: VARCHAR(500) NULL
/// - avatar_url: TEXT NULL
/// - website: TEXT NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PLACEHOLDER_PREFIX: &str = "user_";

fn placeholder_username(id: i64) -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, id)
}

impl User {
    /// Placeholder profile for an identity seen for the first time.
    pub fn placeholder(id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: placeholder_username(id),
            display_name: None,
            bio: None,
            avatar_url: None,
            website: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `username` is the placeholder of some other identity. Those
    /// names stay free for their owner's first sign-in.
    pub fn is_reserved_for_other(username: &str, id: i64) -> bool {
        match username.strip_prefix(PLACEHOLDER_PREFIX) {
            Some(rest) if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) => {
                rest != id.to_string()
            }
            _ => false,
        }
    }

    /// Display name, falling back to the username.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Partial profile update. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
}

impl ProfilePatch {
    /// Apply the patch to a user, normalizing empty strings to `None`.
    pub fn apply(self, user: &mut User) {
        fn clearable(value: String) -> Option<String> {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(v) = self.display_name {
            user.display_name = clearable(v);
        }
        if let Some(v) = self.bio {
            user.bio = clearable(v);
        }
        if let Some(v) = self.avatar_url {
            user.avatar_url = clearable(v);
        }
        if let Some(v) = self.website {
            user.website = clearable(v);
        }
        user.updated_at = Utc::now();
    }
}

/// Repository trait for User data access operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find a user by username (case-insensitive).
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Insert the profile unless a row with its id exists; returns the stored row.
    async fn create_if_missing(&self, user: &User) -> Result<User, AppError>;

    /// Persist profile fields.
    async fn update(&self, user: &User) -> Result<User, AppError>;
}
