//! Document Repository Implementation
//!
//! Versioned documents with an append-only revision history. Every stored
//! version has exactly one revision row, written in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{Document, DocumentRepository, DocumentRevision, EditPolicy};
use crate::shared::error::AppError;

const DOCUMENT_COLUMNS: &str = "id, community_id, title, content, content_hash, version, \
     edit_policy, created_by, last_edited_by, created_at, updated_at, deleted_at";

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    community_id: i64,
    title: String,
    content: String,
    content_hash: String,
    version: i32,
    edit_policy: String,
    created_by: i64,
    last_edited_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            community_id: self.community_id,
            title: self.title,
            content: self.content,
            content_hash: self.content_hash,
            version: self.version,
            edit_policy: EditPolicy::from_str(&self.edit_policy),
            created_by: self.created_by,
            last_edited_by: self.last_edited_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RevisionRow {
    document_id: i64,
    version: i32,
    title: String,
    content: String,
    edited_by: i64,
    created_at: DateTime<Utc>,
}

impl From<RevisionRow> for DocumentRevision {
    fn from(row: RevisionRow) -> Self {
        Self {
            document_id: row.document_id,
            version: row.version,
            title: row.title,
            content: row.content,
            edited_by: row.edited_by,
            created_at: row.created_at,
        }
    }
}

async fn insert_revision(
    tx: &mut Transaction<'static, Postgres>,
    revision: &DocumentRevision,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO document_revisions (document_id, version, title, content, edited_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(revision.document_id)
    .bind(revision.version)
    .bind(&revision.title)
    .bind(&revision.content)
    .bind(revision.edited_by)
    .bind(revision.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// PostgreSQL document repository implementation.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, AppError> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", DOCUMENT_COLUMNS);
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_document()))
    }

    async fn find_by_community(&self, community_id: i64) -> Result<Vec<Document>, AppError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE community_id = $1 AND deleted_at IS NULL \
             ORDER BY updated_at DESC, id DESC",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(community_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_document()).collect())
    }

    async fn create(&self, document: &Document) -> Result<Document, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO documents (id, community_id, title, content, content_hash, version, \
             edit_policy, created_by, last_edited_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let created = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document.id)
            .bind(document.community_id)
            .bind(&document.title)
            .bind(&document.content)
            .bind(&document.content_hash)
            .bind(document.version)
            .bind(document.edit_policy.as_str())
            .bind(document.created_by)
            .bind(document.last_edited_by)
            .bind(document.created_at)
            .bind(document.updated_at)
            .fetch_one(&mut *tx)
            .await?
            .into_document();

        insert_revision(&mut tx, &created.to_revision()).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_versioned(
        &self,
        document: &Document,
        expected_version: i32,
    ) -> Result<Option<Document>, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE documents SET title = $3, content = $4, content_hash = $5, version = $6, \
             edit_policy = $7, last_edited_by = $8, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let stored = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document.id)
            .bind(expected_version)
            .bind(&document.title)
            .bind(&document.content)
            .bind(&document.content_hash)
            .bind(document.version)
            .bind(document.edit_policy.as_str())
            .bind(document.last_edited_by)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(stored) = stored else {
            tx.rollback().await?;
            return Ok(None);
        };
        let stored = stored.into_document();

        insert_revision(&mut tx, &stored.to_revision()).await?;

        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE documents SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_revisions(&self, document_id: i64) -> Result<Vec<DocumentRevision>, AppError> {
        let rows = sqlx::query_as::<_, RevisionRow>(
            r#"
            SELECT document_id, version, title, content, edited_by, created_at
            FROM document_revisions
            WHERE document_id = $1
            ORDER BY version DESC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DocumentRevision::from).collect())
    }

    async fn find_revision(
        &self,
        document_id: i64,
        version: i32,
    ) -> Result<Option<DocumentRevision>, AppError> {
        let row = sqlx::query_as::<_, RevisionRow>(
            r#"
            SELECT document_id, version, title, content, edited_by, created_at
            FROM document_revisions
            WHERE document_id = $1 AND version = $2
            "#,
        )
        .bind(document_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DocumentRevision::from))
    }
}
