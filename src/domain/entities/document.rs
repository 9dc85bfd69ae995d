//! Collaborative document entity, revisions and repository trait.
//!
//! Maps to the `documents` and `document_revisions` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::shared::error::AppError;

/// Maximum document size in characters.
pub const MAX_DOCUMENT_LENGTH: usize = 200_000;

/// Who may edit a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Any active member
    #[default]
    Members,
    /// Owners and moderators
    Moderators,
    /// Only the creator (moderators may still delete)
    Author,
}

impl EditPolicy {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "moderators" => Self::Moderators,
            "author" => Self::Author,
            _ => Self::Members,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::Moderators => "moderators",
            Self::Author => "author",
        }
    }
}

/// Hex-encoded SHA-256 of document content.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Maps to the `documents` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - community_id: BIGINT NOT NULL REFERENCES communities(id) ON DELETE CASCADE
/// - title: VARCHAR(200) NOT NULL
/// - content: TEXT NOT NULL
/// - content_hash: CHAR(64) NOT NULL
/// - version: INTEGER NOT NULL DEFAULT 1
/// - edit_policy: TEXT NOT NULL DEFAULT 'members'
/// - created_by / last_edited_by: BIGINT NOT NULL REFERENCES users(id)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
/// - deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub community_id: i64,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub version: i32,
    pub edit_policy: EditPolicy,
    pub created_by: i64,
    pub last_edited_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The revision row describing the document's current state.
    pub fn to_revision(&self) -> DocumentRevision {
        DocumentRevision {
            document_id: self.id,
            version: self.version,
            title: self.title.clone(),
            content: self.content.clone(),
            edited_by: self.last_edited_by,
            created_at: self.updated_at,
        }
    }
}

/// Maps to the `document_revisions` table (PK document_id, version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRevision {
    pub document_id: i64,
    pub version: i32,
    pub title: String,
    pub content: String,
    pub edited_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Document data access operations.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, AppError>;

    /// Non-deleted documents of a community, most recently updated first.
    async fn find_by_community(&self, community_id: i64) -> Result<Vec<Document>, AppError>;

    /// Insert the document and its first revision.
    async fn create(&self, document: &Document) -> Result<Document, AppError>;

    /// Store a new version if the stored version still equals
    /// `expected_version`, writing a revision row in the same transaction.
    ///
    /// Returns `Ok(None)` when the version check fails.
    async fn update_versioned(
        &self,
        document: &Document,
        expected_version: i32,
    ) -> Result<Option<Document>, AppError>;

    async fn soft_delete(&self, id: i64) -> Result<(), AppError>;

    /// Revisions newest first.
    async fn find_revisions(&self, document_id: i64) -> Result<Vec<DocumentRevision>, AppError>;

    async fn find_revision(
        &self,
        document_id: i64,
        version: i32,
    ) -> Result<Option<DocumentRevision>, AppError>;
}
