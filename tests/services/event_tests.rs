//! Events, RSVPs and the waitlist.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use community_hub::application::services::{
    CreateEventDto, EventError, EventService, EventView, UpdateEventDto,
};
use community_hub::domain::{
    Channel, EventStatus, MemberRole, RsvpStatus, Visibility, MAX_CHANNEL_NAME_LENGTH,
};

use crate::common::TestHub;

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const CAROL: i64 = 4;
const OUTSIDER: i64 = 90;

async fn meetup() -> (TestHub, i64) {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    for user_id in [ALICE, BOB, CAROL] {
        hub.add_member(community.id, user_id, MemberRole::Member);
    }
    (hub, community.id)
}

fn request(title: &str, capacity: Option<i32>) -> CreateEventDto {
    let starts_at = Utc::now() + Duration::days(1);
    CreateEventDto {
        title: title.into(),
        description: Some("Bring snacks".into()),
        location: None,
        starts_at,
        ends_at: Some(starts_at + Duration::hours(2)),
        capacity,
    }
}

async fn event(hub: &TestHub, community_id: i64, capacity: Option<i32>) -> EventView {
    hub.events()
        .create_event(community_id, OWNER, request("Release Party", capacity))
        .await
        .unwrap()
}

fn bound_channel(hub: &TestHub, event_id: i64) -> Channel {
    hub.store
        .tables()
        .channels
        .values()
        .find(|c| c.event_id == Some(event_id))
        .cloned()
        .expect("event channel")
}

#[tokio::test]
async fn test_create_event_opens_a_channel() {
    let (hub, community_id) = meetup().await;

    let err = hub
        .events()
        .create_event(community_id, ALICE, request("Hack Night", None))
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::Forbidden));

    let view = event(&hub, community_id, Some(10)).await;
    assert_eq!(view.event.status, EventStatus::Scheduled);
    assert_eq!(view.tally.going, 0);
    assert_eq!(view.my_rsvp, None);

    let channel = bound_channel(&hub, view.event.id);
    assert_eq!(Some(channel.id), view.event.channel_id);
    assert_eq!(channel.name, "release-party");
    assert_eq!(channel.topic.as_deref(), Some("Chat for Release Party"));
    assert_eq!(channel.position, 1);

    let events = hub.publisher.events_on(&format!("community:{}", community_id));
    assert!(events.contains(&"channel.created".to_string()));
    assert!(events.contains(&"event.updated".to_string()));
}

#[tokio::test]
async fn test_repeated_titles_get_distinct_channels() {
    let (hub, community_id) = meetup().await;

    let first = event(&hub, community_id, None).await;
    let second = event(&hub, community_id, None).await;

    assert_eq!(bound_channel(&hub, first.event.id).name, "release-party");
    assert_eq!(bound_channel(&hub, second.event.id).name, "release-party-2");
    assert_eq!(second.event.title, first.event.title);
}

#[tokio::test]
async fn test_long_title_fits_channel_name() {
    let (hub, community_id) = meetup().await;
    let title = "Quarterly community gathering ".repeat(6);
    assert!(title.trim().chars().count() > MAX_CHANNEL_NAME_LENGTH);

    let view = hub
        .events()
        .create_event(community_id, OWNER, request(&title, None))
        .await
        .unwrap();

    let channel = bound_channel(&hub, view.event.id);
    assert!(channel.name.chars().count() <= MAX_CHANNEL_NAME_LENGTH);
    assert!(channel.name.starts_with("quarterly-community-gathering"));
    assert!(!channel.name.ends_with('-'));
    assert_eq!(view.event.channel_id, Some(channel.id));
}

#[tokio::test]
async fn test_schedule_is_validated() {
    let (hub, community_id) = meetup().await;
    let events = hub.events();

    let mut backwards = request("Backwards", None);
    backwards.ends_at = Some(backwards.starts_at - Duration::minutes(1));
    let err = events
        .create_event(community_id, OWNER, backwards)
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::InvalidSchedule));

    let err = events
        .create_event(community_id, OWNER, request("Nobody", Some(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::InvalidCapacity));
}

#[tokio::test]
async fn test_full_event_waitlists_and_promotes() {
    let (hub, community_id) = meetup().await;
    let events = hub.events();
    let view = event(&hub, community_id, Some(2)).await;
    let event_id = view.event.id;

    for user_id in [ALICE, BOB] {
        let outcome = events.rsvp(event_id, user_id, RsvpStatus::Going).await.unwrap();
        assert_eq!(outcome.rsvp.status, RsvpStatus::Going);
    }
    let carol = events.rsvp(event_id, CAROL, RsvpStatus::Going).await.unwrap();
    assert_eq!(carol.rsvp.status, RsvpStatus::Waitlisted);
    assert_eq!(carol.tally.going, 2);
    assert_eq!(carol.tally.waitlisted, 1);

    let declined = events.rsvp(event_id, BOB, RsvpStatus::Declined).await.unwrap();
    assert_eq!(declined.rsvp.status, RsvpStatus::Declined);
    assert_eq!(declined.promoted.len(), 1);
    assert_eq!(declined.promoted[0].user_id, CAROL);
    assert_eq!(declined.tally.going, 2);
    assert_eq!(declined.tally.waitlisted, 0);

    let seen_by_carol = events.get_event(event_id, CAROL).await.unwrap();
    assert_eq!(seen_by_carol.my_rsvp, Some(RsvpStatus::Going));

    // One announcement for each RSVP plus the promotion.
    let rsvp_events = hub
        .publisher
        .events_on(&format!("event:{}", event_id))
        .into_iter()
        .filter(|e| e == "rsvp.updated")
        .count();
    assert_eq!(rsvp_events, 5);
}

#[tokio::test]
async fn test_waitlist_cannot_be_requested() {
    let (hub, community_id) = meetup().await;
    let view = event(&hub, community_id, Some(1)).await;

    let err = hub
        .events()
        .rsvp(view.event.id, ALICE, RsvpStatus::Waitlisted)
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::InvalidRsvp));

    let err = hub
        .events()
        .rsvp(view.event.id, OUTSIDER, RsvpStatus::Going)
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::Forbidden));
}

#[tokio::test]
async fn test_growing_capacity_promotes_waitlist() {
    let (hub, community_id) = meetup().await;
    let events = hub.events();
    let view = event(&hub, community_id, Some(1)).await;
    let event_id = view.event.id;

    for user_id in [ALICE, BOB, CAROL] {
        events.rsvp(event_id, user_id, RsvpStatus::Going).await.unwrap();
    }

    let updated = events
        .update_event(
            event_id,
            OWNER,
            UpdateEventDto {
                capacity: Some(Some(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tally.going, 2);
    assert_eq!(updated.tally.waitlisted, 1);

    let rsvps = events.list_rsvps(event_id, OUTSIDER).await.unwrap();
    let bob = rsvps.iter().find(|r| r.user_id == BOB).unwrap();
    let carol = rsvps.iter().find(|r| r.user_id == CAROL).unwrap();
    assert_eq!(bob.status, RsvpStatus::Going);
    assert_eq!(carol.status, RsvpStatus::Waitlisted);

    let unlimited = events
        .update_event(
            event_id,
            OWNER,
            UpdateEventDto {
                capacity: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unlimited.tally.going, 3);
    assert_eq!(unlimited.tally.waitlisted, 0);
}

#[tokio::test]
async fn test_only_organizers_update() {
    let (hub, community_id) = meetup().await;
    let view = event(&hub, community_id, None).await;

    let err = hub
        .events()
        .update_event(
            view.event.id,
            ALICE,
            UpdateEventDto {
                title: Some("Mine now".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::Forbidden));

    let updated = hub
        .events()
        .update_event(
            view.event.id,
            OWNER,
            UpdateEventDto {
                description: Some(None),
                location: Some(Some("Room 4".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.event.description, None);
    assert_eq!(updated.event.location.as_deref(), Some("Room 4"));
}

#[tokio::test]
async fn test_cancel_archives_channel_and_freezes_rsvps() {
    let (hub, community_id) = meetup().await;
    let events = hub.events();
    let view = event(&hub, community_id, None).await;
    let event_id = view.event.id;
    events.rsvp(event_id, ALICE, RsvpStatus::Going).await.unwrap();

    let cancelled = events.cancel_event(event_id, OWNER).await.unwrap();
    assert_eq!(cancelled.event.status, EventStatus::Cancelled);
    assert!(bound_channel(&hub, event_id).archived);

    // Cancelling twice is a no-op.
    let again = events.cancel_event(event_id, OWNER).await.unwrap();
    assert_eq!(again.event.status, EventStatus::Cancelled);

    let err = events
        .rsvp(event_id, BOB, RsvpStatus::Going)
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::Cancelled));
    let err = events
        .update_event(event_id, OWNER, UpdateEventDto::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::Cancelled));
}

#[tokio::test]
async fn test_ended_event_is_closed_and_not_upcoming() {
    let (hub, community_id) = meetup().await;
    let events = hub.events();

    let starts_at = Utc::now() - Duration::hours(3);
    let past = events
        .create_event(
            community_id,
            OWNER,
            CreateEventDto {
                title: "Yesterday".into(),
                description: None,
                location: None,
                starts_at,
                ends_at: Some(starts_at + Duration::hours(1)),
                capacity: None,
            },
        )
        .await
        .unwrap();
    let future = event(&hub, community_id, None).await;

    let err = events
        .rsvp(past.event.id, ALICE, RsvpStatus::Going)
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::Closed));

    let upcoming = events.list_events(community_id, ALICE, true).await.unwrap();
    let ids: Vec<i64> = upcoming.iter().map(|v| v.event.id).collect();
    assert_eq!(ids, vec![future.event.id]);

    let all = events.list_events(community_id, ALICE, false).await.unwrap();
    let ids: Vec<i64> = all.iter().map(|v| v.event.id).collect();
    assert_eq!(ids, vec![past.event.id, future.event.id]);
}
