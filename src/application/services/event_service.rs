//! Event Service
//!
//! Scheduled community events with a bound chat channel, capacity limits
//! and a first-come waitlist.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::notifier::{tags, Notifier};
use crate::domain::events::{channels, RealtimeEvent};
use crate::domain::services::PermissionService;
use crate::domain::{
    normalize_channel_name, unique_channel_name, Channel, ChannelRepository, CommunityRepository,
    Event, EventRepository, EventStatus, Member, MemberRepository, Rsvp, RsvpStatus, RsvpTally,
    Visibility,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Event service trait
#[async_trait]
pub trait EventService: Send + Sync {
    /// Create an event and its channel (moderators)
    async fn create_event(&self, community_id: i64, actor_id: i64, request: CreateEventDto) -> Result<EventView, EventError>;

    async fn get_event(&self, event_id: i64, viewer_id: i64) -> Result<EventView, EventError>;

    async fn list_events(&self, community_id: i64, viewer_id: i64, upcoming_only: bool) -> Result<Vec<EventView>, EventError>;

    /// Moderators or the creator
    async fn update_event(&self, event_id: i64, actor_id: i64, update: UpdateEventDto) -> Result<EventView, EventError>;

    /// Cancel, archive the bound channel and freeze RSVPs
    async fn cancel_event(&self, event_id: i64, actor_id: i64) -> Result<EventView, EventError>;

    async fn rsvp(&self, event_id: i64, user_id: i64, status: RsvpStatus) -> Result<RsvpOutcome, EventError>;

    async fn list_rsvps(&self, event_id: i64, viewer_id: i64) -> Result<Vec<Rsvp>, EventError>;
}

/// Create event request
#[derive(Debug, Clone)]
pub struct CreateEventDto {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
}

/// Update event request. Nested options distinguish "unchanged" from "clear".
#[derive(Debug, Clone, Default)]
pub struct UpdateEventDto {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub capacity: Option<Option<i32>>,
}

/// Event with its attendance tally
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub tally: RsvpTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rsvp: Option<RsvpStatus>,
}

/// Result of an RSVP, including anyone promoted off the waitlist
#[derive(Debug, Clone, Serialize)]
pub struct RsvpOutcome {
    pub rsvp: Rsvp,
    pub promoted: Vec<Rsvp>,
    pub tally: RsvpTally,
}

/// Event service errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Community not found")]
    CommunityNotFound,

    #[error("Event not found")]
    NotFound,

    #[error("Event must end after it starts")]
    InvalidSchedule,

    #[error("Capacity must be at least 1")]
    InvalidCapacity,

    #[error("Waitlist placement is decided by the server")]
    InvalidRsvp,

    #[error("Event is cancelled")]
    Cancelled,

    #[error("Event no longer accepts RSVPs")]
    Closed,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<EventError> for AppError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::CommunityNotFound | EventError::NotFound => AppError::NotFound(e.to_string()),
            EventError::InvalidSchedule | EventError::InvalidCapacity | EventError::InvalidRsvp => {
                AppError::Validation(e.to_string())
            }
            EventError::Cancelled | EventError::Closed => AppError::BadRequest(e.to_string()),
            EventError::Forbidden => AppError::Forbidden(e.to_string()),
            EventError::Repository(inner) => inner,
        }
    }
}

fn check_schedule(
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    capacity: Option<i32>,
) -> Result<(), EventError> {
    if ends_at.is_some_and(|end| end <= starts_at) {
        return Err(EventError::InvalidSchedule);
    }
    if capacity.is_some_and(|c| c < 1) {
        return Err(EventError::InvalidCapacity);
    }
    Ok(())
}

/// EventService implementation
pub struct EventServiceImpl<E, Ch, C, M>
where
    E: EventRepository,
    Ch: ChannelRepository,
    C: CommunityRepository,
    M: MemberRepository,
{
    event_repo: Arc<E>,
    channel_repo: Arc<Ch>,
    community_repo: Arc<C>,
    member_repo: Arc<M>,
    id_generator: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl<E, Ch, C, M> EventServiceImpl<E, Ch, C, M>
where
    E: EventRepository,
    Ch: ChannelRepository,
    C: CommunityRepository,
    M: MemberRepository,
{
    pub fn new(
        event_repo: Arc<E>,
        channel_repo: Arc<Ch>,
        community_repo: Arc<C>,
        member_repo: Arc<M>,
        id_generator: Arc<SnowflakeGenerator>,
        notifier: Notifier,
    ) -> Self {
        Self {
            event_repo,
            channel_repo,
            community_repo,
            member_repo,
            id_generator,
            notifier,
        }
    }

    async fn load_event(&self, event_id: i64) -> Result<Event, EventError> {
        self.event_repo
            .find_by_id(event_id)
            .await?
            .ok_or(EventError::NotFound)
    }

    async fn require_viewer(&self, community_id: i64, viewer_id: i64) -> Result<Option<Member>, EventError> {
        let community = self
            .community_repo
            .find_by_id(community_id)
            .await?
            .ok_or(EventError::CommunityNotFound)?;
        let member = self.member_repo.find(community_id, viewer_id).await?;
        if community.visibility == Visibility::Private
            && !PermissionService::is_active_member(member.as_ref())
        {
            return Err(EventError::Forbidden);
        }
        Ok(member)
    }

    /// Moderators, or the creator while still an active member.
    async fn require_organizer(&self, event: &Event, actor_id: i64) -> Result<(), EventError> {
        let member = self.member_repo.find(event.community_id, actor_id).await?;
        let allowed = PermissionService::can_moderate(member.as_ref())
            || PermissionService::can_edit_own(event.created_by, actor_id, member.as_ref());
        if !allowed {
            return Err(EventError::Forbidden);
        }
        Ok(())
    }

    async fn view(&self, event: Event, viewer_id: Option<i64>) -> Result<EventView, EventError> {
        let (tally, my_rsvp) = match viewer_id {
            Some(viewer_id) => {
                let rsvps = self.event_repo.find_rsvps(event.id).await?;
                let mine = rsvps
                    .iter()
                    .find(|r| r.user_id == viewer_id)
                    .map(|r| r.status);
                (RsvpTally::from_rsvps(&rsvps), mine)
            }
            None => (self.event_repo.tally(event.id).await?, None),
        };
        Ok(EventView {
            event,
            tally,
            my_rsvp,
        })
    }

    async fn announce_event(&self, event: &Event) {
        self.notifier
            .publish(
                &[channels::event(event.id), channels::community(event.community_id)],
                RealtimeEvent::EventUpdated {
                    event_id: event.id,
                    status: event.status.as_str().to_string(),
                },
            )
            .await;
        self.notifier
            .revalidate(&[tags::community(event.community_id)])
            .await;
    }

    async fn announce_rsvps(&self, event_id: i64, rsvps: impl IntoIterator<Item = Rsvp>, tally: RsvpTally) {
        for rsvp in rsvps {
            self.notifier
                .publish(
                    &[channels::event(event_id)],
                    RealtimeEvent::RsvpUpdated {
                        event_id,
                        rsvp,
                        tally,
                    },
                )
                .await;
        }
    }
}

#[async_trait]
impl<E, Ch, C, M> EventService for EventServiceImpl<E, Ch, C, M>
where
    E: EventRepository + 'static,
    Ch: ChannelRepository + 'static,
    C: CommunityRepository + 'static,
    M: MemberRepository + 'static,
{
    async fn create_event(&self, community_id: i64, actor_id: i64, request: CreateEventDto) -> Result<EventView, EventError> {
        let member = self.require_viewer(community_id, actor_id).await?;
        if !PermissionService::can_moderate(member.as_ref()) {
            return Err(EventError::Forbidden);
        }
        check_schedule(request.starts_at, request.ends_at, request.capacity)?;

        let now = Utc::now();
        let event_id = self.id_generator.generate();
        let channel_id = self.id_generator.generate();
        let title = request.title.trim().to_string();

        let event = Event {
            id: event_id,
            community_id,
            title: title.clone(),
            description: request.description,
            location: request.location,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            capacity: request.capacity,
            status: EventStatus::Scheduled,
            channel_id: Some(channel_id),
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };

        let existing = self.channel_repo.find_by_community(community_id).await?;
        let name = unique_channel_name(&normalize_channel_name(&title), |name| {
            existing.iter().any(|c| c.name == name)
        });
        let channel = Channel {
            id: channel_id,
            community_id,
            name,
            topic: Some(format!("Chat for {}", title)),
            event_id: Some(event_id),
            position: self.channel_repo.next_position(community_id).await?,
            archived: false,
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };
        let (created, channel) = self.event_repo.create(&event, &channel).await?;

        tracing::info!(event_id, channel_id, community_id, actor_id, "Event created");

        self.notifier
            .publish(
                &[channels::community(community_id)],
                RealtimeEvent::ChannelCreated(channel),
            )
            .await;
        self.announce_event(&created).await;
        self.view(created, None).await
    }

    async fn get_event(&self, event_id: i64, viewer_id: i64) -> Result<EventView, EventError> {
        let event = self.load_event(event_id).await?;
        self.require_viewer(event.community_id, viewer_id).await?;
        self.view(event, Some(viewer_id)).await
    }

    async fn list_events(&self, community_id: i64, viewer_id: i64, upcoming_only: bool) -> Result<Vec<EventView>, EventError> {
        self.require_viewer(community_id, viewer_id).await?;
        let from = upcoming_only.then(Utc::now);
        let events = self.event_repo.find_by_community(community_id, from).await?;

        let mut views = Vec::with_capacity(events.len());
        for event in events {
            views.push(self.view(event, None).await?);
        }
        Ok(views)
    }

    async fn update_event(&self, event_id: i64, actor_id: i64, update: UpdateEventDto) -> Result<EventView, EventError> {
        let mut event = self.load_event(event_id).await?;
        self.require_organizer(&event, actor_id).await?;
        if event.is_cancelled() {
            return Err(EventError::Cancelled);
        }

        let previous_capacity = event.capacity;
        if let Some(title) = update.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            event.description = description;
        }
        if let Some(location) = update.location {
            event.location = location;
        }
        if let Some(starts_at) = update.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = update.ends_at {
            event.ends_at = ends_at;
        }
        if let Some(capacity) = update.capacity {
            event.capacity = capacity;
        }
        check_schedule(event.starts_at, event.ends_at, event.capacity)?;
        event.updated_at = Utc::now();

        let updated = self.event_repo.update(&event).await?;
        self.announce_event(&updated).await;

        let grew = match (previous_capacity, updated.capacity) {
            (Some(before), Some(after)) => after > before,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if grew {
            let promoted = self
                .event_repo
                .promote_waitlisted(event_id, updated.capacity)
                .await?;
            if !promoted.is_empty() {
                tracing::info!(event_id, promoted = promoted.len(), "Waitlist promoted");
                let tally = self.event_repo.tally(event_id).await?;
                self.announce_rsvps(event_id, promoted, tally).await;
            }
        }

        self.view(updated, Some(actor_id)).await
    }

    async fn cancel_event(&self, event_id: i64, actor_id: i64) -> Result<EventView, EventError> {
        let mut event = self.load_event(event_id).await?;
        self.require_organizer(&event, actor_id).await?;
        if event.is_cancelled() {
            return self.view(event, Some(actor_id)).await;
        }

        event.status = EventStatus::Cancelled;
        event.updated_at = Utc::now();
        let cancelled = self.event_repo.update(&event).await?;

        if let Some(mut channel) = self.channel_repo.find_by_event(event_id).await? {
            if !channel.archived {
                channel.archived = true;
                channel.updated_at = Utc::now();
                let channel = self.channel_repo.update(&channel).await?;
                self.notifier
                    .publish(
                        &[channels::community(channel.community_id)],
                        RealtimeEvent::ChannelUpdated(channel),
                    )
                    .await;
            }
        }

        tracing::info!(event_id, actor_id, "Event cancelled");
        self.announce_event(&cancelled).await;
        self.view(cancelled, Some(actor_id)).await
    }

    async fn rsvp(&self, event_id: i64, user_id: i64, status: RsvpStatus) -> Result<RsvpOutcome, EventError> {
        if status == RsvpStatus::Waitlisted {
            return Err(EventError::InvalidRsvp);
        }

        let event = self.load_event(event_id).await?;
        let member = self.member_repo.find(event.community_id, user_id).await?;
        if !PermissionService::is_active_member(member.as_ref()) {
            return Err(EventError::Forbidden);
        }
        if event.is_cancelled() {
            return Err(EventError::Cancelled);
        }
        if !event.accepts_rsvps(Utc::now()) {
            return Err(EventError::Closed);
        }

        let change = self
            .event_repo
            .set_rsvp(event_id, user_id, status, event.capacity)
            .await?;
        let tally = self.event_repo.tally(event_id).await?;

        tracing::debug!(
            event_id,
            user_id,
            status = change.rsvp.status.as_str(),
            promoted = change.promoted.len(),
            "RSVP recorded"
        );

        let announced = std::iter::once(change.rsvp.clone()).chain(change.promoted.iter().cloned());
        self.announce_rsvps(event_id, announced, tally).await;

        Ok(RsvpOutcome {
            rsvp: change.rsvp,
            promoted: change.promoted,
            tally,
        })
    }

    async fn list_rsvps(&self, event_id: i64, viewer_id: i64) -> Result<Vec<Rsvp>, EventError> {
        let event = self.load_event(event_id).await?;
        self.require_viewer(event.community_id, viewer_id).await?;
        Ok(self.event_repo.find_rsvps(event_id).await?)
    }
}
