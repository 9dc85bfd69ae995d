//! Redis broker publisher.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use crate::application::services::RealtimePublisher;
use crate::domain::RealtimeEnvelope;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Publishes realtime envelopes with `PUBLISH {prefix}{channel}`.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
    prefix: Arc<str>,
}

impl RedisPublisher {
    pub fn new(conn: ConnectionManager, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn format_channel(&self, channel: &str) -> String {
        format!("{}{}", self.prefix, channel)
    }
}

#[async_trait]
impl RealtimePublisher for RedisPublisher {
    #[instrument(skip(self, envelope), fields(event = envelope.event.name()), level = "debug")]
    async fn publish(&self, channel: &str, envelope: &RealtimeEnvelope) -> Result<(), AppError> {
        let payload = serde_json::to_string(envelope)
            .map_err(|e| AppError::Internal(format!("Envelope serialization failed: {}", e)))?;
        let full_channel = self.format_channel(channel);
        let mut conn = self.conn.clone();

        let result: Result<i64, redis::RedisError> = conn.publish(&full_channel, payload).await;
        metrics::record_publish(envelope.event.name(), result.is_ok());

        let receivers = result?;
        debug!(channel = %full_channel, receivers, "Published");
        Ok(())
    }
}
