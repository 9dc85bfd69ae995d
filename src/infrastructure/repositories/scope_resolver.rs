//! Resolves the owning community of a realtime scope.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::application::services::ScopeResolver;
use crate::domain::Scope;
use crate::shared::error::AppError;

/// PostgreSQL scope resolver, one lookup per scope kind.
#[derive(Clone)]
pub struct PgScopeResolver {
    pool: PgPool,
}

impl PgScopeResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeResolver for PgScopeResolver {
    async fn community_of(&self, scope: Scope) -> Result<Option<i64>, AppError> {
        let (sql, id) = match scope {
            Scope::Community(id) => ("SELECT id FROM communities WHERE id = $1", id),
            Scope::Channel(id) => ("SELECT community_id FROM channels WHERE id = $1", id),
            Scope::Thread(id) => (
                "SELECT c.community_id FROM messages m \
                 INNER JOIN channels c ON c.id = m.channel_id \
                 WHERE m.id = $1 AND m.thread_root_id IS NULL",
                id,
            ),
            Scope::Post(id) => ("SELECT community_id FROM posts WHERE id = $1", id),
            Scope::Document(id) => (
                "SELECT community_id FROM documents WHERE id = $1 AND deleted_at IS NULL",
                id,
            ),
            Scope::Event(id) => ("SELECT community_id FROM events WHERE id = $1", id),
            Scope::User(_) => return Ok(None),
        };

        let community_id: Option<i64> = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(community_id)
    }
}
