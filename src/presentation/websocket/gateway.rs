//! WebSocket Gateway
//!
//! Tracks identified sessions and which broker channels each one follows.
//! Broker messages enter through [`Gateway::dispatch`] and fan out to the
//! subscribed sessions' outbound queues.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::messages::GatewaySend;
use crate::domain::Scope;
use crate::infrastructure::metrics;

/// Canonical form of a client-supplied channel name (`channel:007` ->
/// `channel:7`). Unparseable names come back unchanged.
pub fn canonical_channel(raw: &str) -> String {
    Scope::parse(raw)
        .map(|scope| scope.name())
        .unwrap_or_else(|| raw.to_string())
}

/// Connected session with its outbound queue
pub struct ConnectedSession {
    pub user_id: i64,
    pub session_id: String,
    sender: mpsc::UnboundedSender<GatewaySend>,
    sequence: AtomicU64,
    channels: Mutex<HashSet<String>>,
}

impl ConnectedSession {
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Queue a dispatch with the next sequence number.
    pub fn send_dispatch(&self, name: &str, data: Value) -> bool {
        let frame = GatewaySend::dispatch(name, self.next_sequence(), data);
        self.sender.send(frame).is_ok()
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().iter().cloned().collect()
    }
}

/// WebSocket gateway managing all connections
pub struct Gateway {
    /// Identified sessions by session_id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// Broker channel to subscribed session ids
    channel_sessions: DashMap<String, HashSet<String>>,
    /// Open sockets, identified or not
    connections: AtomicUsize,
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new(heartbeat_interval_ms: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            channel_sessions: DashMap::new(),
            connections: AtomicUsize::new(0),
            heartbeat_interval_ms,
        }
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.report();
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
        self.report();
    }

    fn report(&self) {
        metrics::set_gateway_connections(
            self.connections.load(Ordering::Relaxed),
            self.sessions.len(),
        );
    }

    /// Register an identified session
    pub fn register_session(
        &self,
        session_id: String,
        user_id: i64,
        sender: mpsc::UnboundedSender<GatewaySend>,
    ) -> Arc<ConnectedSession> {
        let session = Arc::new(ConnectedSession {
            user_id,
            session_id: session_id.clone(),
            sender,
            sequence: AtomicU64::new(0),
            channels: Mutex::new(HashSet::new()),
        });
        self.sessions.insert(session_id.clone(), session.clone());
        self.report();

        tracing::info!(user_id, session_id = %session_id, "Session registered");
        session
    }

    /// Drop a session and every subscription it held
    pub fn unregister_session(&self, session_id: &str) {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return;
        };
        for channel in session.channels.lock().drain() {
            self.detach(&channel, session_id);
        }
        self.report();

        tracing::info!(
            user_id = session.user_id,
            session_id = %session_id,
            "Session unregistered"
        );
    }

    /// Returns false when the session already followed the channel.
    pub fn subscribe(&self, session_id: &str, channel: &str) -> bool {
        let Some(session) = self.sessions.get(session_id).map(|s| s.clone()) else {
            return false;
        };
        if !session.channels.lock().insert(channel.to_string()) {
            return false;
        }
        self.channel_sessions
            .entry(channel.to_string())
            .or_default()
            .insert(session_id.to_string());
        true
    }

    /// Returns false when the session did not follow the channel.
    pub fn unsubscribe(&self, session_id: &str, channel: &str) -> bool {
        let Some(session) = self.sessions.get(session_id).map(|s| s.clone()) else {
            return false;
        };
        if !session.channels.lock().remove(channel) {
            return false;
        }
        self.detach(channel, session_id);
        true
    }

    fn detach(&self, channel: &str, session_id: &str) {
        if let Some(mut subscribers) = self.channel_sessions.get_mut(channel) {
            subscribers.remove(session_id);
        }
        self.channel_sessions
            .remove_if(channel, |_, subscribers| subscribers.is_empty());
    }

    /// Deliver one broker event to every subscriber of `channel`.
    ///
    /// Returns the number of sessions the event was queued for.
    pub fn dispatch(&self, channel: &str, name: &str, data: Value) -> usize {
        let targets: Vec<Arc<ConnectedSession>> = match self.channel_sessions.get(channel) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.sessions.get(id).map(|s| s.clone()))
                .collect(),
            None => return 0,
        };

        targets
            .iter()
            .filter(|session| session.send_dispatch(name, data.clone()))
            .count()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channel_sessions
            .get(channel)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
