//! Cache Module
//!
//! Redis connection management, the realtime broker publisher, and the
//! tagged page cache.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+      +-------------------+
//! |     Notifier      |      |  Forum handlers   |
//! +-------------------+      +-------------------+
//!     |          |                    |
//!     v          v                    v
//! +--------+ +-----------------------------+
//! | Redis  | |        RedisPageCache       |  <-- page:{key}, tag:{tag} sets
//! |Publisher| +-----------------------------+
//! +--------+            |
//!     |                 v
//!     |        +-------------------+
//!     +------> | ConnectionManager |  <-- automatic reconnection
//!              +-------------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use community_hub::infrastructure::cache::{create_redis_client, RedisPublisher};
//!
//! let conn = create_redis_client(&settings.redis).await?;
//! let publisher = RedisPublisher::new(conn.clone(), &settings.realtime.channel_prefix);
//! ```

mod page_cache;
mod publisher;

pub use page_cache::RedisPageCache;
pub use publisher::RedisPublisher;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Arguments
/// * `settings` - Redis configuration settings
///
/// # Returns
/// * `Ok(ConnectionManager)` - On successful connection
/// * `Err(redis::RedisError)` - If connection fails
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key prefixes.
pub mod keys {
    /// Prefix for cached page bodies (e.g., "page:/communities/1/posts?sort=hot")
    pub const PAGE: &str = "page:";

    /// Prefix for tag sets holding page keys (e.g., "tag:community:1:posts")
    pub const TAG: &str = "tag:";

    /// Generates a page key
    #[inline]
    pub fn page(path: &str) -> String {
        format!("{}{}", PAGE, path)
    }

    /// Generates a tag set key
    #[inline]
    pub fn tag(tag: &str) -> String {
        format!("{}{}", TAG, tag)
    }

    /// Generates the page key of a forum listing
    pub fn post_listing(community_id: i64, sort: &str, page: i64, per_page: i32) -> String {
        self::page(&format!(
            "/communities/{}/posts?sort={}&page={}&per_page={}",
            community_id, sort, page, per_page
        ))
    }
}
