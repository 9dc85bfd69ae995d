//! Community Repository Implementation
//!
//! PostgreSQL implementation of the CommunityRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::channel_repository::insert_channel;
use crate::domain::{Channel, Community, CommunityRepository, MemberRole, MemberStatus, Visibility};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct CommunityRow {
    id: i64,
    slug: String,
    name: String,
    description: Option<String>,
    visibility: String,
    owner_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommunityRow {
    fn into_community(self) -> Community {
        Community {
            id: self.id,
            slug: self.slug,
            name: self.name,
            description: self.description,
            visibility: Visibility::from_str(&self.visibility),
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Unique violations on the slug surface as conflicts.
fn map_slug_conflict(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Slug already taken".into())
        }
        _ => AppError::Database(e),
    }
}

/// PostgreSQL community repository implementation.
#[derive(Clone)]
pub struct PgCommunityRepository {
    pool: PgPool,
}

impl PgCommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunityRepository for PgCommunityRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Community>, AppError> {
        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT id, slug, name, description, visibility, owner_id, created_at, updated_at
            FROM communities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_community()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Community>, AppError> {
        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT id, slug, name, description, visibility, owner_id, created_at, updated_at
            FROM communities
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_community()))
    }

    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Community>, AppError> {
        let rows = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT c.id, c.slug, c.name, c.description, c.visibility, c.owner_id,
                   c.created_at, c.updated_at
            FROM communities c
            INNER JOIN community_members m ON m.community_id = c.id
            WHERE m.user_id = $1 AND m.status = $2
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(user_id)
        .bind(MemberStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_community()).collect())
    }

    async fn create(&self, community: &Community, general: &Channel) -> Result<Community, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            INSERT INTO communities (id, slug, name, description, visibility, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, slug, name, description, visibility, owner_id, created_at, updated_at
            "#,
        )
        .bind(community.id)
        .bind(&community.slug)
        .bind(&community.name)
        .bind(&community.description)
        .bind(community.visibility.as_str())
        .bind(community.owner_id)
        .bind(community.created_at)
        .bind(community.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_slug_conflict)?;

        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, user_id, role, status, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(community.id)
        .bind(community.owner_id)
        .bind(MemberRole::Owner.as_str())
        .bind(MemberStatus::Active.as_str())
        .bind(community.created_at)
        .execute(&mut *tx)
        .await?;

        insert_channel(&mut *tx, general).await?;

        tx.commit().await?;
        Ok(row.into_community())
    }

    async fn update(&self, community: &Community) -> Result<Community, AppError> {
        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            UPDATE communities
            SET name = $2, description = $3, visibility = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, slug, name, description, visibility, owner_id, created_at, updated_at
            "#,
        )
        .bind(community.id)
        .bind(&community.name)
        .bind(&community.description)
        .bind(community.visibility.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_community())
            .ok_or_else(|| AppError::NotFound(format!("Community {} not found", community.id)))
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM communities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Community {} not found", id)));
        }
        Ok(())
    }
}
