//! WebSocket Session State

use std::time::Instant;

use chrono::Utc;

use crate::application::services::RealtimeClaims;

/// Per-connection state owned by the connection task
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub claims: Option<RealtimeClaims>,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            claims: None,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn identify(&mut self, claims: RealtimeClaims) {
        self.claims = Some(claims);
        self.last_heartbeat = Instant::now();
    }

    pub fn is_identified(&self) -> bool {
        self.claims.is_some()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.claims.as_ref().and_then(|c| c.user_id())
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout_ms: u64) -> bool {
        self.last_heartbeat.elapsed().as_millis() < u128::from(timeout_ms)
    }

    /// The capability token has passed its `exp`.
    pub fn is_expired(&self) -> bool {
        self.claims
            .as_ref()
            .is_some_and(|c| c.exp <= Utc::now().timestamp())
    }
}
