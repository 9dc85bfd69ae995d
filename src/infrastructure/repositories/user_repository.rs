//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Maps between the users table and the domain User profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{User, UserRepository};
use crate::shared::error::AppError;

/// Database row representation of the users table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    website: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            website: self.website,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn map_username_conflict(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Username already taken".into())
        }
        _ => AppError::Database(e),
    }
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, display_name, bio, avatar_url, website, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, display_name, bio, avatar_url, website, created_at, updated_at
            FROM users
            WHERE username = LOWER($1)
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn create_if_missing(&self, user: &User) -> Result<User, AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, display_name, bio, avatar_url, website, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(&user.website)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_username_conflict)?;

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("User {} missing after insert", user.id)))
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = $2, display_name = $3, bio = $4, avatar_url = $5,
                website = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, display_name, bio, avatar_url, website, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(&user.website)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_username_conflict)?;

        row.map(|r| r.into_user())
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))
    }
}
