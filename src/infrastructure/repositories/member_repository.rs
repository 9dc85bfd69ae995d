//! Member Repository Implementation
//!
//! PostgreSQL implementation of community membership storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Member, MemberRepository, MemberRole, MemberStatus};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    community_id: i64,
    user_id: i64,
    role: String,
    status: String,
    joined_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_member(self) -> Member {
        Member {
            community_id: self.community_id,
            user_id: self.user_id,
            role: MemberRole::from_str(&self.role),
            status: MemberStatus::from_str(&self.status),
            joined_at: self.joined_at,
        }
    }
}

/// PostgreSQL member repository implementation.
#[derive(Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn find(&self, community_id: i64, user_id: i64) -> Result<Option<Member>, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT community_id, user_id, role, status, joined_at
            FROM community_members
            WHERE community_id = $1 AND user_id = $2
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_member()))
    }

    async fn find_by_community(
        &self,
        community_id: i64,
        status: Option<MemberStatus>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT community_id, user_id, role, status, joined_at
            FROM community_members
            WHERE community_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::bigint IS NULL OR user_id > $3)
            ORDER BY user_id ASC
            LIMIT $4
            "#,
        )
        .bind(community_id)
        .bind(status.map(|s| s.as_str()))
        .bind(after)
        .bind(i64::from(limit.max(1)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_member()).collect())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT community_id, user_id, role, status, joined_at
            FROM community_members
            WHERE user_id = $1 AND status = $2
            ORDER BY joined_at ASC
            "#,
        )
        .bind(user_id)
        .bind(MemberStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_member()).collect())
    }

    async fn create(&self, member: &Member) -> Result<Member, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO community_members (community_id, user_id, role, status, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING community_id, user_id, role, status, joined_at
            "#,
        )
        .bind(member.community_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.status.as_str())
        .bind(member.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Already a member".into())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_member())
    }

    async fn update(&self, member: &Member) -> Result<Member, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            UPDATE community_members
            SET role = $3, status = $4
            WHERE community_id = $1 AND user_id = $2
            RETURNING community_id, user_id, role, status, joined_at
            "#,
        )
        .bind(member.community_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_member())
            .ok_or_else(|| AppError::NotFound("Member not found".into()))
    }

    async fn delete(&self, community_id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM community_members WHERE community_id = $1 AND user_id = $2")
            .bind(community_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_active(&self, community_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM community_members WHERE community_id = $1 AND status = $2",
        )
        .bind(community_id)
        .bind(MemberStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
