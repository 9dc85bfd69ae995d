//! Realtime publishing and page-cache revalidation.
//!
//! Both are best effort: a mutation that already committed is never failed
//! because the broker or the cache is unavailable. Failures are logged and
//! counted, then dropped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::events::{RealtimeEnvelope, RealtimeEvent};
use crate::shared::error::AppError;

/// Publishes envelopes on broker channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    /// `channel` is the unprefixed name, e.g. `channel:42`.
    async fn publish(&self, channel: &str, envelope: &RealtimeEnvelope) -> Result<(), AppError>;
}

/// Drops cached pages by tag.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, tag: &str) -> Result<(), AppError>;
}

/// Cache tags.
pub mod tags {
    pub fn community(id: i64) -> String {
        format!("community:{}", id)
    }

    pub fn community_posts(id: i64) -> String {
        format!("community:{}:posts", id)
    }

    pub fn post(id: i64) -> String {
        format!("post:{}", id)
    }
}

/// Fan-out helper shared by the application services.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn RealtimePublisher>,
    revalidator: Arc<dyn Revalidator>,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn RealtimePublisher>, revalidator: Arc<dyn Revalidator>) -> Self {
        Self {
            publisher,
            revalidator,
        }
    }

    /// Publish one event on every listed channel. Never fails.
    pub async fn publish(&self, channels: &[String], event: RealtimeEvent) {
        let envelope = RealtimeEnvelope::now(event);
        for channel in channels {
            if let Err(e) = self.publisher.publish(channel, &envelope).await {
                tracing::warn!(
                    channel = %channel,
                    event = envelope.event.name(),
                    error = %e,
                    "Realtime publish failed"
                );
            }
        }
    }

    /// Publish from a spawned task so the caller does not wait on the broker.
    pub fn publish_detached(&self, channels: Vec<String>, event: RealtimeEvent) {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.publish(&channels, event).await;
        });
    }

    /// Revalidate every listed tag. Never fails.
    pub async fn revalidate(&self, tags: &[String]) {
        for tag in tags {
            if let Err(e) = self.revalidator.revalidate(tag).await {
                tracing::warn!(tag = %tag, error = %e, "Cache revalidation failed");
            }
        }
    }
}
