//! Tagged page cache
//!
//! Page bodies are stored as JSON strings under `page:{path}`. Every tag a
//! page depends on keeps a set of page keys under `tag:{tag}`, so dropping a
//! tag drops every page that was built from it.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

use super::keys;
use crate::application::services::Revalidator;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Redis-backed page cache.
#[derive(Clone)]
pub struct RedisPageCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPageCache {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    /// Cached body for `key`, if present and readable.
    #[instrument(skip(self), level = "debug")]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key).await?;

        let Some(data) = cached else {
            debug!(key, "Page cache miss");
            return Ok(None);
        };
        match serde_json::from_str(&data) {
            Ok(value) => {
                debug!(key, "Page cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                // Unreadable entries are treated as misses and overwritten.
                warn!(key, error = %e, "Discarding unreadable cached page");
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` and register it with every tag.
    #[instrument(skip(self, value), level = "debug")]
    pub async fn put<T: Serialize>(&self, key: &str, tags: &[String], value: &T) -> Result<(), AppError> {
        let data = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Page serialization failed: {}", e)))?;
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic().set_ex(key, data, self.ttl_secs).ignore();
        for tag in tags {
            let tag_key = keys::tag(tag);
            pipe.sadd(&tag_key, key).ignore();
            // Tag sets outlive their pages by at most one TTL.
            pipe.expire(&tag_key, self.ttl_secs as i64).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        debug!(key, tags = tags.len(), "Page cached");
        Ok(())
    }
}

#[async_trait]
impl Revalidator for RedisPageCache {
    #[instrument(skip(self), level = "debug")]
    async fn revalidate(&self, tag: &str) -> Result<(), AppError> {
        let tag_key = keys::tag(tag);
        let mut conn = self.conn.clone();

        let result: Result<usize, redis::RedisError> = async {
            let pages: Vec<String> = conn.smembers(&tag_key).await?;
            let mut pipe = redis::pipe();
            pipe.atomic();
            if !pages.is_empty() {
                pipe.del(&pages).ignore();
            }
            pipe.del(&tag_key).ignore();
            pipe.query_async::<()>(&mut conn).await?;
            Ok(pages.len())
        }
        .await;

        metrics::record_revalidation(result.is_ok());
        let dropped = result?;
        debug!(tag, dropped, "Tag revalidated");
        Ok(())
    }
}
