//! Broker Bridge
//!
//! Pattern-subscribes to every prefixed broker channel and hands each
//! message to the gateway. Reconnects with capped backoff when the
//! subscription drops.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn};

use super::gateway::Gateway;
use crate::domain::RealtimeEnvelope;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Run until the process exits.
pub async fn run_broker_bridge(client: redis::Client, prefix: String, gateway: Arc<Gateway>) {
    let mut backoff = Duration::from_millis(500);

    loop {
        match forward(&client, &prefix, &gateway).await {
            Ok(()) => {
                warn!("Broker subscription ended, reconnecting");
                backoff = Duration::from_millis(500);
            }
            Err(e) => {
                warn!(error = %e, retry_in_ms = backoff.as_millis() as u64, "Broker bridge failed");
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn forward(
    client: &redis::Client,
    prefix: &str,
    gateway: &Gateway,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(format!("{}*", prefix)).await?;
    info!(pattern = %format!("{}*", prefix), "Broker bridge subscribed");

    let mut messages = pubsub.into_on_message();
    while let Some(msg) = messages.next().await {
        let Some(channel) = msg.get_channel_name().strip_prefix(prefix) else {
            continue;
        };
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(channel, error = %e, "Unreadable broker payload");
                continue;
            }
        };
        relay(gateway, channel, &payload);
    }
    Ok(())
}

/// Parse one broker payload and dispatch it. Returns sessions reached.
pub fn relay(gateway: &Gateway, channel: &str, payload: &str) -> usize {
    let envelope: RealtimeEnvelope = match serde_json::from_str(payload) {
        Ok(e) => e,
        Err(e) => {
            warn!(channel, error = %e, "Malformed realtime envelope");
            return 0;
        }
    };

    let name = envelope.event.name();
    let wire = match serde_json::to_value(&envelope) {
        Ok(v) => v,
        Err(e) => {
            warn!(channel, error = %e, "Envelope re-encoding failed");
            return 0;
        }
    };
    let data = json!({
        "channel": channel,
        "data": wire.get("data").cloned().unwrap_or_default(),
        "published_at": envelope.published_at,
    });

    let delivered = gateway.dispatch(channel, name, data);
    debug!(channel, event = name, delivered, "Relayed broker event");
    delivered
}
