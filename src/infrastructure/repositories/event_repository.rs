//! Event Repository Implementation
//!
//! Events and RSVPs. RSVP changes lock the event row so that capacity
//! checks and waitlist promotion see a consistent going count.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::channel_repository::insert_channel;
use crate::domain::{
    free_seats, Channel, Event, EventRepository, EventStatus, Rsvp, RsvpChange, RsvpStatus, RsvpTally,
};
use crate::shared::error::AppError;

const EVENT_COLUMNS: &str = "id, community_id, title, description, location, starts_at, ends_at, \
     capacity, status, channel_id, created_by, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    community_id: i64,
    title: String,
    description: Option<String>,
    location: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    capacity: Option<i32>,
    status: String,
    channel_id: Option<i64>,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self) -> Event {
        Event {
            id: self.id,
            community_id: self.community_id,
            title: self.title,
            description: self.description,
            location: self.location,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            capacity: self.capacity,
            status: EventStatus::from_str(&self.status),
            channel_id: self.channel_id,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RsvpRow {
    event_id: i64,
    user_id: i64,
    status: String,
    responded_at: DateTime<Utc>,
}

impl RsvpRow {
    fn into_rsvp(self) -> Result<Rsvp, AppError> {
        let status = RsvpStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown RSVP status {}", self.status)))?;
        Ok(Rsvp {
            event_id: self.event_id,
            user_id: self.user_id,
            status,
            responded_at: self.responded_at,
        })
    }
}

async fn lock_event(tx: &mut Transaction<'static, Postgres>, event_id: i64) -> Result<(), AppError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))
}

async fn count_going(
    tx: &mut Transaction<'static, Postgres>,
    event_id: i64,
    excluding: Option<i64>,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM event_rsvps
        WHERE event_id = $1 AND status = 'going' AND ($2::bigint IS NULL OR user_id <> $2)
        "#,
    )
    .bind(event_id)
    .bind(excluding)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

/// Move waitlisted attendees to `going`, oldest response first.
async fn promote_in(
    tx: &mut Transaction<'static, Postgres>,
    event_id: i64,
    capacity: Option<i32>,
) -> Result<Vec<Rsvp>, AppError> {
    let going = count_going(tx, event_id, None).await?;
    let seats = free_seats(going, capacity);
    if seats == Some(0) {
        return Ok(Vec::new());
    }

    // LIMIT NULL promotes everyone when the event has no capacity.
    let rows = sqlx::query_as::<_, RsvpRow>(
        r#"
        UPDATE event_rsvps SET status = 'going'
        WHERE event_id = $1 AND user_id IN (
            SELECT user_id FROM event_rsvps
            WHERE event_id = $1 AND status = 'waitlisted'
            ORDER BY responded_at ASC, user_id ASC
            LIMIT $2
        )
        RETURNING event_id, user_id, status, responded_at
        "#,
    )
    .bind(event_id)
    .bind(seats)
    .fetch_all(&mut **tx)
    .await?;

    let mut promoted = rows
        .into_iter()
        .map(RsvpRow::into_rsvp)
        .collect::<Result<Vec<_>, _>>()?;
    promoted.sort_by_key(|r| (r.responded_at, r.user_id));
    Ok(promoted)
}

/// PostgreSQL event repository implementation.
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, AppError> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_event()))
    }

    async fn find_by_community(
        &self,
        community_id: i64,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, AppError> {
        let sql = format!(
            "SELECT {} FROM events WHERE community_id = $1 \
             AND ($2::timestamptz IS NULL OR COALESCE(ends_at, starts_at) >= $2) \
             ORDER BY starts_at ASC, id ASC",
            EVENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(community_id)
            .bind(from)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_event()).collect())
    }

    async fn create(&self, event: &Event, channel: &Channel) -> Result<(Event, Channel), AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO events (id, community_id, title, description, location, starts_at, \
             ends_at, capacity, status, channel_id, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {}",
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event.id)
            .bind(event.community_id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(event.capacity)
            .bind(event.status.as_str())
            .bind(event.channel_id)
            .bind(event.created_by)
            .bind(event.created_at)
            .bind(event.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        // channels.event_id references the event row inserted above
        let channel = insert_channel(&mut *tx, channel).await?;

        tx.commit().await?;
        Ok((row.into_event(), channel))
    }

    async fn update(&self, event: &Event) -> Result<Event, AppError> {
        let sql = format!(
            "UPDATE events SET title = $2, description = $3, location = $4, starts_at = $5, \
             ends_at = $6, capacity = $7, status = $8, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(event.capacity)
            .bind(event.status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_event())
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event.id)))
    }

    async fn find_rsvps(&self, event_id: i64) -> Result<Vec<Rsvp>, AppError> {
        let rows = sqlx::query_as::<_, RsvpRow>(
            r#"
            SELECT event_id, user_id, status, responded_at
            FROM event_rsvps
            WHERE event_id = $1
            ORDER BY responded_at ASC, user_id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RsvpRow::into_rsvp).collect()
    }

    async fn tally(&self, event_id: i64) -> Result<RsvpTally, AppError> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM event_rsvps WHERE event_id = $1 GROUP BY status",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tally = RsvpTally::default();
        for (status, count) in counts {
            match RsvpStatus::from_str(&status) {
                Some(RsvpStatus::Going) => tally.going = count,
                Some(RsvpStatus::Maybe) => tally.maybe = count,
                Some(RsvpStatus::Declined) => tally.declined = count,
                Some(RsvpStatus::Waitlisted) => tally.waitlisted = count,
                None => tracing::warn!(event_id, status = %status, "Unknown RSVP status"),
            }
        }
        Ok(tally)
    }

    async fn set_rsvp(
        &self,
        event_id: i64,
        user_id: i64,
        requested: RsvpStatus,
        capacity: Option<i32>,
    ) -> Result<RsvpChange, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_event(&mut tx, event_id).await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT status FROM event_rsvps WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let previous = previous.as_deref().and_then(RsvpStatus::from_str);

        let going_others = count_going(&mut tx, event_id, Some(user_id)).await?;
        let status = RsvpStatus::resolve(requested, previous, going_others, capacity);

        // Waitlist order is the time of the latest status change.
        let rsvp = sqlx::query_as::<_, RsvpRow>(
            r#"
            INSERT INTO event_rsvps (event_id, user_id, status, responded_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (event_id, user_id) DO UPDATE
            SET status = EXCLUDED.status,
                responded_at = CASE
                    WHEN event_rsvps.status = EXCLUDED.status THEN event_rsvps.responded_at
                    ELSE EXCLUDED.responded_at
                END
            RETURNING event_id, user_id, status, responded_at
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?
        .into_rsvp()?;

        let promoted = if previous == Some(RsvpStatus::Going) && status != RsvpStatus::Going {
            promote_in(&mut tx, event_id, capacity).await?
        } else {
            Vec::new()
        };

        tx.commit().await?;
        Ok(RsvpChange { rsvp, promoted })
    }

    async fn promote_waitlisted(
        &self,
        event_id: i64,
        capacity: Option<i32>,
    ) -> Result<Vec<Rsvp>, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_event(&mut tx, event_id).await?;
        let promoted = promote_in(&mut tx, event_id, capacity).await?;
        tx.commit().await?;
        Ok(promoted)
    }
}
