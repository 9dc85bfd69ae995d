//! Channel management and unread summaries.

use pretty_assertions::assert_eq;

use community_hub::application::services::{
    ChannelError, ChannelService, CreateChannelDto, CreateMessageDto, MessageService,
    UpdateChannelDto,
};
use chrono::Utc;
use community_hub::domain::{Channel, ChannelRepository, MemberRole, Visibility};
use community_hub::shared::error::AppError;

use crate::common::TestHub;

const OWNER: i64 = 1;
const MOD: i64 = 2;
const ALICE: i64 = 3;

fn named(name: &str) -> CreateChannelDto {
    CreateChannelDto {
        name: name.into(),
        topic: Some("  ".into()),
    }
}

#[tokio::test]
async fn test_moderators_create_channels_at_the_end() {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    hub.add_member(community.id, MOD, MemberRole::Moderator);
    hub.add_member(community.id, ALICE, MemberRole::Member);
    let channels = hub.channels();

    let err = channels
        .create_channel(community.id, ALICE, named("off-topic"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Forbidden));

    let created = channels
        .create_channel(community.id, MOD, named("  Release Planning "))
        .await
        .unwrap();
    assert_eq!(created.name, "release-planning");
    assert_eq!(created.topic, None);
    assert_eq!(created.position, 1);

    let err = channels
        .create_channel(community.id, MOD, named("release planning"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NameTaken));

    assert!(hub
        .publisher
        .events_on(&format!("community:{}", community.id))
        .contains(&"channel.created".to_string()));
}

#[tokio::test]
async fn test_store_rejects_duplicate_names_like_the_schema() {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    let now = Utc::now();
    let clash = Channel {
        id: hub.next_id(),
        community_id: community.id,
        name: "general".into(),
        topic: None,
        event_id: None,
        position: 9,
        archived: false,
        created_by: OWNER,
        created_at: now,
        updated_at: now,
    };

    let err = hub.store.create(&clash).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = hub
        .store
        .create(&Channel {
            name: "x".repeat(101),
            ..clash
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
}

#[tokio::test]
async fn test_rename_checks_for_clashes() {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    let channels = hub.channels();
    let random = channels
        .create_channel(community.id, OWNER, named("random"))
        .await
        .unwrap();

    let err = channels
        .update_channel(
            random.id,
            OWNER,
            UpdateChannelDto {
                name: Some("General".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NameTaken));

    let updated = channels
        .update_channel(
            random.id,
            OWNER,
            UpdateChannelDto {
                topic: Some("anything goes".into()),
                position: Some(-3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.topic.as_deref(), Some("anything goes"));
    assert_eq!(updated.position, 0);
}

#[tokio::test]
async fn test_list_channels_carries_unread_counts() {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    hub.add_member(community.id, ALICE, MemberRole::Member);
    let general = hub.general_channel(community.id);

    hub.messages()
        .send_message(
            general.id,
            OWNER,
            CreateMessageDto {
                content: "welcome".into(),
                reply_to: None,
            },
        )
        .await
        .unwrap();

    let summaries = hub.channels().list_channels(community.id, ALICE).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].channel.id, general.id);
    assert_eq!(summaries[0].unread_count, 1);

    let counts = hub.channels().unread_counts(community.id, OWNER).await.unwrap();
    assert_eq!(counts[0].count, 0);

    let err = hub.channels().list_channels(community.id, 404).await.unwrap_err();
    assert!(matches!(err, ChannelError::Forbidden));
}

#[tokio::test]
async fn test_delete_channel_removes_messages() {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    let channels = hub.channels();
    let random = channels
        .create_channel(community.id, OWNER, named("random"))
        .await
        .unwrap();
    hub.messages()
        .send_message(
            random.id,
            OWNER,
            CreateMessageDto {
                content: "bye".into(),
                reply_to: None,
            },
        )
        .await
        .unwrap();

    channels.delete_channel(random.id, OWNER).await.unwrap();

    let err = channels.get_channel(random.id, OWNER).await.unwrap_err();
    assert!(matches!(err, ChannelError::NotFound));
    assert!(hub
        .store
        .tables()
        .messages
        .values()
        .all(|m| m.channel_id != random.id));
}
