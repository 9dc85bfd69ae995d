//! Snowflake ID Generator
//!
//! Time-ordered 64-bit ids. Keyset pagination over messages, posts and
//! comments relies on ids sorting in creation order.
//!
//! ```text
//! 63                       22        12          0
//! +--------------------------+---------+-----------+
//! | ms since epoch (41 bits) | machine | sequence  |
//! |                          | 10 bits | 12 bits   |
//! +--------------------------+---------+-----------+
//! ```

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

/// Default epoch (2024-01-01T00:00:00Z) in milliseconds.
pub const DEFAULT_EPOCH: u64 = 1_704_067_200_000;

const MACHINE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    epoch: u64,
    machine_id: u64,
    // (last timestamp, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, epoch: u64) -> Self {
        Self {
            epoch,
            machine_id: machine_id & ((1 << MACHINE_BITS) - 1),
            state: Mutex::new((0, 0)),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        let mut timestamp = now_millis().max(state.0);

        if timestamp == state.0 {
            state.1 = (state.1 + 1) & MAX_SEQUENCE;
            if state.1 == 0 {
                // Sequence exhausted for this millisecond, borrow the next one.
                timestamp += 1;
            }
        } else {
            state.1 = 0;
        }
        state.0 = timestamp;

        let elapsed = timestamp.saturating_sub(self.epoch);
        ((elapsed << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.1) as i64
    }

    /// Creation time encoded in an id produced by this generator.
    pub fn timestamp_of(&self, id: i64) -> DateTime<Utc> {
        let ms = ((id as u64) >> (MACHINE_BITS + SEQUENCE_BITS)) + self.epoch;
        Utc.timestamp_millis_opt(ms as i64)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(1, DEFAULT_EPOCH)
    }
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Parse a snowflake from a path or query string.
pub fn parse_id(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().filter(|id| *id > 0)
}
