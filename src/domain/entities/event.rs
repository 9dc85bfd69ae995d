//! Event and RSVP entities with the repository trait.
//!
//! Maps to the `events` and `event_rsvps` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Channel;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Scheduled,
    Cancelled,
}

impl EventStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "cancelled" => Self::Cancelled,
            _ => Self::Scheduled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Maps to the `events` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - community_id: BIGINT NOT NULL REFERENCES communities(id) ON DELETE CASCADE
/// - title: VARCHAR(200) NOT NULL
/// - description / location: TEXT NULL
/// - starts_at: TIMESTAMPTZ NOT NULL
/// - ends_at: TIMESTAMPTZ NULL CHECK (ends_at > starts_at)
/// - capacity: INTEGER NULL CHECK (capacity > 0)
/// - status: TEXT NOT NULL DEFAULT 'scheduled'
/// - channel_id: BIGINT NULL -- the event's discussion channel
/// - created_by: BIGINT NOT NULL REFERENCES users(id)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub community_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub status: EventStatus,
    pub channel_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// An event has ended once `ends_at` (or `starts_at` when open-ended) passed.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.unwrap_or(self.starts_at) < now
    }

    /// RSVPs are frozen for cancelled and finished events.
    pub fn accepts_rsvps(&self, now: DateTime<Utc>) -> bool {
        !self.is_cancelled() && !self.has_ended(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Going,
    Maybe,
    Declined,
    /// Wanted to go while the event was full
    Waitlisted,
}

impl RsvpStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "going" => Some(Self::Going),
            "maybe" => Some(Self::Maybe),
            "declined" => Some(Self::Declined),
            "waitlisted" => Some(Self::Waitlisted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Going => "going",
            Self::Maybe => "maybe",
            Self::Declined => "declined",
            Self::Waitlisted => "waitlisted",
        }
    }

    /// Status actually stored for a request.
    ///
    /// `going_others` is the number of `going` RSVPs excluding this user.
    pub fn resolve(
        requested: RsvpStatus,
        previous: Option<RsvpStatus>,
        going_others: i64,
        capacity: Option<i32>,
    ) -> RsvpStatus {
        match requested {
            RsvpStatus::Going => {
                if previous == Some(RsvpStatus::Going) {
                    return RsvpStatus::Going;
                }
                match capacity {
                    Some(cap) if going_others >= i64::from(cap) => RsvpStatus::Waitlisted,
                    _ => RsvpStatus::Going,
                }
            }
            other => other,
        }
    }
}

/// Maps to the `event_rsvps` table:
/// - event_id: BIGINT NOT NULL REFERENCES events(id) ON DELETE CASCADE (composite PK)
/// - user_id: BIGINT NOT NULL REFERENCES users(id) (composite PK)
/// - status: TEXT NOT NULL
/// - responded_at: TIMESTAMPTZ NOT NULL -- waitlist order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rsvp {
    pub event_id: i64,
    pub user_id: i64,
    pub status: RsvpStatus,
    pub responded_at: DateTime<Utc>,
}

/// RSVP totals for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RsvpTally {
    pub going: i64,
    pub maybe: i64,
    pub declined: i64,
    pub waitlisted: i64,
}

impl RsvpTally {
    pub fn from_rsvps<'a>(rsvps: impl IntoIterator<Item = &'a Rsvp>) -> Self {
        rsvps.into_iter().fold(Self::default(), |mut t, r| {
            match r.status {
                RsvpStatus::Going => t.going += 1,
                RsvpStatus::Maybe => t.maybe += 1,
                RsvpStatus::Declined => t.declined += 1,
                RsvpStatus::Waitlisted => t.waitlisted += 1,
            }
            t
        })
    }
}

/// Outcome of an RSVP change.
#[derive(Debug, Clone, PartialEq)]
pub struct RsvpChange {
    pub rsvp: Rsvp,
    /// Waitlisted attendees moved to `going` by this change.
    pub promoted: Vec<Rsvp>,
}

/// Repository trait for Event and RSVP data access operations.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, AppError>;

    /// Events of a community by start time; `from` limits to events
    /// ending (or starting, when open-ended) at or after that instant.
    async fn find_by_community(
        &self,
        community_id: i64,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, AppError>;

    /// Insert the event together with its bound channel, all or nothing.
    async fn create(&self, event: &Event, channel: &Channel) -> Result<(Event, Channel), AppError>;

    async fn update(&self, event: &Event) -> Result<Event, AppError>;

    async fn find_rsvps(&self, event_id: i64) -> Result<Vec<Rsvp>, AppError>;

    async fn tally(&self, event_id: i64) -> Result<RsvpTally, AppError>;

    /// Store the user's RSVP, resolving it against capacity with
    /// [`RsvpStatus::resolve`], and promote waitlisted attendees into any
    /// freed seats. Runs under a lock on the event row.
    async fn set_rsvp(
        &self,
        event_id: i64,
        user_id: i64,
        requested: RsvpStatus,
        capacity: Option<i32>,
    ) -> Result<RsvpChange, AppError>;

    /// Promote waitlisted attendees, oldest first, while seats are free.
    async fn promote_waitlisted(
        &self,
        event_id: i64,
        capacity: Option<i32>,
    ) -> Result<Vec<Rsvp>, AppError>;
}

/// Number of waitlisted attendees that fit given the current going count.
pub fn free_seats(going: i64, capacity: Option<i32>) -> Option<i64> {
    capacity.map(|cap| (i64::from(cap) - going).max(0))
}
