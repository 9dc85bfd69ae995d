//! Document Service
//!
//! Collaboratively edited documents with optimistic versioning. Each
//! successful update bumps `version` and stores a revision; writers must
//! name the version they edited, and stale writers get a conflict.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::notifier::{tags, Notifier};
use crate::domain::events::{channels, RealtimeEvent};
use crate::domain::services::PermissionService;
use crate::domain::{
    content_hash, CommunityRepository, Document, DocumentRepository, DocumentRevision, EditPolicy,
    Member, MemberRepository, Visibility, MAX_DOCUMENT_LENGTH,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Document service trait
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn create_document(
        &self,
        community_id: i64,
        actor_id: i64,
        request: CreateDocumentDto,
    ) -> Result<Document, DocumentError>;

    async fn get_document(&self, document_id: i64, viewer_id: i64) -> Result<Document, DocumentError>;

    async fn list_documents(&self, community_id: i64, viewer_id: i64) -> Result<Vec<DocumentSummary>, DocumentError>;

    /// Store a new version if `expected_version` is still current
    async fn update_document(
        &self,
        document_id: i64,
        actor_id: i64,
        update: UpdateDocumentDto,
    ) -> Result<Document, DocumentError>;

    async fn list_revisions(&self, document_id: i64, viewer_id: i64) -> Result<Vec<RevisionSummary>, DocumentError>;

    async fn get_revision(
        &self,
        document_id: i64,
        version: i32,
        viewer_id: i64,
    ) -> Result<DocumentRevision, DocumentError>;

    /// Write an old revision's title and content as a new version
    async fn restore_revision(
        &self,
        document_id: i64,
        version: i32,
        actor_id: i64,
    ) -> Result<Document, DocumentError>;

    /// Soft delete (creator or moderator)
    async fn delete_document(&self, document_id: i64, actor_id: i64) -> Result<(), DocumentError>;
}

/// Create document request
#[derive(Debug, Clone)]
pub struct CreateDocumentDto {
    pub title: String,
    pub content: String,
    pub edit_policy: EditPolicy,
}

/// Update document request
#[derive(Debug, Clone)]
pub struct UpdateDocumentDto {
    pub title: Option<String>,
    pub content: Option<String>,
    pub edit_policy: Option<EditPolicy>,
    pub expected_version: i32,
}

/// Document listing entry without content
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub community_id: i64,
    pub title: String,
    pub version: i32,
    pub edit_policy: EditPolicy,
    pub created_by: i64,
    pub last_edited_by: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentSummary {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            community_id: doc.community_id,
            title: doc.title,
            version: doc.version,
            edit_policy: doc.edit_policy,
            created_by: doc.created_by,
            last_edited_by: doc.last_edited_by,
            updated_at: doc.updated_at,
        }
    }
}

/// Revision history entry without content
#[derive(Debug, Clone, Serialize)]
pub struct RevisionSummary {
    pub version: i32,
    pub title: String,
    pub content_hash: String,
    pub edited_by: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentRevision> for RevisionSummary {
    fn from(rev: DocumentRevision) -> Self {
        Self {
            version: rev.version,
            content_hash: content_hash(&rev.content),
            title: rev.title,
            edited_by: rev.edited_by,
            created_at: rev.created_at,
        }
    }
}

/// Document service errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Community not found")]
    CommunityNotFound,

    #[error("Document not found")]
    NotFound,

    #[error("Revision not found")]
    RevisionNotFound,

    #[error("Document was changed by someone else (current version {current})")]
    VersionConflict { current: i32 },

    #[error("Document exceeds {MAX_DOCUMENT_LENGTH} characters")]
    TooLong,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<DocumentError> for AppError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::CommunityNotFound
            | DocumentError::NotFound
            | DocumentError::RevisionNotFound => AppError::NotFound(e.to_string()),
            DocumentError::VersionConflict { .. } => AppError::Conflict(e.to_string()),
            DocumentError::TooLong => AppError::Validation(e.to_string()),
            DocumentError::Forbidden => AppError::Forbidden(e.to_string()),
            DocumentError::Repository(inner) => inner,
        }
    }
}

/// DocumentService implementation
pub struct DocumentServiceImpl<D, C, M>
where
    D: DocumentRepository,
    C: CommunityRepository,
    M: MemberRepository,
{
    document_repo: Arc<D>,
    community_repo: Arc<C>,
    member_repo: Arc<M>,
    id_generator: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl<D, C, M> DocumentServiceImpl<D, C, M>
where
    D: DocumentRepository,
    C: CommunityRepository,
    M: MemberRepository,
{
    pub fn new(
        document_repo: Arc<D>,
        community_repo: Arc<C>,
        member_repo: Arc<M>,
        id_generator: Arc<SnowflakeGenerator>,
        notifier: Notifier,
    ) -> Self {
        Self {
            document_repo,
            community_repo,
            member_repo,
            id_generator,
            notifier,
        }
    }

    async fn load_document(&self, document_id: i64) -> Result<Document, DocumentError> {
        self.document_repo
            .find_by_id(document_id)
            .await?
            .filter(|d| !d.is_deleted())
            .ok_or(DocumentError::NotFound)
    }

    async fn require_viewer(&self, community_id: i64, viewer_id: i64) -> Result<Option<Member>, DocumentError> {
        let community = self
            .community_repo
            .find_by_id(community_id)
            .await?
            .ok_or(DocumentError::CommunityNotFound)?;
        let member = self.member_repo.find(community_id, viewer_id).await?;
        if community.visibility == Visibility::Private
            && !PermissionService::is_active_member(member.as_ref())
        {
            return Err(DocumentError::Forbidden);
        }
        Ok(member)
    }

    fn check_length(content: &str) -> Result<(), DocumentError> {
        if content.chars().count() > MAX_DOCUMENT_LENGTH {
            return Err(DocumentError::TooLong);
        }
        Ok(())
    }

    /// Persist `next` as the version after `expected_version`.
    async fn write_version(
        &self,
        next: Document,
        expected_version: i32,
    ) -> Result<Document, DocumentError> {
        let stored = self
            .document_repo
            .update_versioned(&next, expected_version)
            .await?;

        let Some(stored) = stored else {
            let current = self.load_document(next.id).await?.version;
            return Err(DocumentError::VersionConflict { current });
        };

        tracing::info!(
            document_id = stored.id,
            version = stored.version,
            edited_by = stored.last_edited_by,
            "Document updated"
        );
        self.notifier
            .publish(
                &[channels::document(stored.id)],
                RealtimeEvent::DocumentUpdated {
                    document_id: stored.id,
                    version: stored.version,
                    title: stored.title.clone(),
                    content_hash: stored.content_hash.clone(),
                    edited_by: stored.last_edited_by,
                },
            )
            .await;
        self.notifier
            .revalidate(&[tags::community(stored.community_id)])
            .await;
        Ok(stored)
    }
}

#[async_trait]
impl<D, C, M> DocumentService for DocumentServiceImpl<D, C, M>
where
    D: DocumentRepository + 'static,
    C: CommunityRepository + 'static,
    M: MemberRepository + 'static,
{
    async fn create_document(
        &self,
        community_id: i64,
        actor_id: i64,
        request: CreateDocumentDto,
    ) -> Result<Document, DocumentError> {
        let member = self.require_viewer(community_id, actor_id).await?;
        if !PermissionService::is_active_member(member.as_ref()) {
            return Err(DocumentError::Forbidden);
        }
        Self::check_length(&request.content)?;

        let now = Utc::now();
        let document = Document {
            id: self.id_generator.generate(),
            community_id,
            title: request.title.trim().to_string(),
            content_hash: content_hash(&request.content),
            content: request.content,
            version: 1,
            edit_policy: request.edit_policy,
            created_by: actor_id,
            last_edited_by: actor_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let created = self.document_repo.create(&document).await?;

        tracing::info!(document_id = created.id, community_id, actor_id, "Document created");
        self.notifier.revalidate(&[tags::community(community_id)]).await;
        Ok(created)
    }

    async fn get_document(&self, document_id: i64, viewer_id: i64) -> Result<Document, DocumentError> {
        let document = self.load_document(document_id).await?;
        self.require_viewer(document.community_id, viewer_id).await?;
        Ok(document)
    }

    async fn list_documents(&self, community_id: i64, viewer_id: i64) -> Result<Vec<DocumentSummary>, DocumentError> {
        self.require_viewer(community_id, viewer_id).await?;
        let documents = self.document_repo.find_by_community(community_id).await?;
        Ok(documents.into_iter().map(DocumentSummary::from).collect())
    }

    async fn update_document(
        &self,
        document_id: i64,
        actor_id: i64,
        update: UpdateDocumentDto,
    ) -> Result<Document, DocumentError> {
        let document = self.load_document(document_id).await?;
        let member = self.member_repo.find(document.community_id, actor_id).await?;

        if !PermissionService::can_edit_document(
            document.edit_policy,
            document.created_by,
            actor_id,
            member.as_ref(),
        ) {
            return Err(DocumentError::Forbidden);
        }
        if let Some(policy) = update.edit_policy {
            let may_change_policy = PermissionService::can_delete(
                document.created_by,
                actor_id,
                member.as_ref(),
            );
            if policy != document.edit_policy && !may_change_policy {
                return Err(DocumentError::Forbidden);
            }
        }
        if update.expected_version != document.version {
            return Err(DocumentError::VersionConflict {
                current: document.version,
            });
        }

        let mut next = document.clone();
        if let Some(title) = update.title {
            next.title = title.trim().to_string();
        }
        if let Some(content) = update.content {
            Self::check_length(&content)?;
            next.content_hash = content_hash(&content);
            next.content = content;
        }
        if let Some(policy) = update.edit_policy {
            next.edit_policy = policy;
        }

        let unchanged = next.title == document.title
            && next.content_hash == document.content_hash
            && next.edit_policy == document.edit_policy;
        if unchanged {
            return Ok(document);
        }

        next.version = document.version + 1;
        next.last_edited_by = actor_id;
        next.updated_at = Utc::now();
        self.write_version(next, document.version).await
    }

    async fn list_revisions(&self, document_id: i64, viewer_id: i64) -> Result<Vec<RevisionSummary>, DocumentError> {
        let document = self.load_document(document_id).await?;
        self.require_viewer(document.community_id, viewer_id).await?;
        let revisions = self.document_repo.find_revisions(document_id).await?;
        Ok(revisions.into_iter().map(RevisionSummary::from).collect())
    }

    async fn get_revision(
        &self,
        document_id: i64,
        version: i32,
        viewer_id: i64,
    ) -> Result<DocumentRevision, DocumentError> {
        let document = self.load_document(document_id).await?;
        self.require_viewer(document.community_id, viewer_id).await?;
        self.document_repo
            .find_revision(document_id, version)
            .await?
            .ok_or(DocumentError::RevisionNotFound)
    }

    async fn restore_revision(
        &self,
        document_id: i64,
        version: i32,
        actor_id: i64,
    ) -> Result<Document, DocumentError> {
        let document = self.load_document(document_id).await?;
        let member = self.member_repo.find(document.community_id, actor_id).await?;
        if !PermissionService::can_edit_document(
            document.edit_policy,
            document.created_by,
            actor_id,
            member.as_ref(),
        ) {
            return Err(DocumentError::Forbidden);
        }

        let revision = self
            .document_repo
            .find_revision(document_id, version)
            .await?
            .ok_or(DocumentError::RevisionNotFound)?;

        let next = Document {
            title: revision.title,
            content_hash: content_hash(&revision.content),
            content: revision.content,
            version: document.version + 1,
            last_edited_by: actor_id,
            updated_at: Utc::now(),
            ..document.clone()
        };
        tracing::info!(document_id, restored = version, actor_id, "Restoring revision");
        self.write_version(next, document.version).await
    }

    async fn delete_document(&self, document_id: i64, actor_id: i64) -> Result<(), DocumentError> {
        let document = self.load_document(document_id).await?;
        let member = self.member_repo.find(document.community_id, actor_id).await?;
        if !PermissionService::can_delete(document.created_by, actor_id, member.as_ref()) {
            return Err(DocumentError::Forbidden);
        }

        self.document_repo.soft_delete(document_id).await?;
        tracing::info!(document_id, actor_id, "Document deleted");

        self.notifier
            .publish(
                &[channels::document(document_id)],
                RealtimeEvent::DocumentDeleted { document_id },
            )
            .await;
        self.notifier
            .revalidate(&[tags::community(document.community_id)])
            .await;
        Ok(())
    }
}
