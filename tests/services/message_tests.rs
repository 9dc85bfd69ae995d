//! Chat messages, threads, pins and read cursors.

use pretty_assertions::assert_eq;

use community_hub::application::services::{
    ChannelService, CreateChannelDto, CreateMessageDto, MessageError, MessageQueryDto,
    MessageService,
};
use community_hub::domain::services::ThreadError;
use community_hub::domain::{MemberRole, Message, PinScope, Visibility};

use crate::common::{Messages, TestHub};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const STRANGER: i64 = 99;

struct Room {
    hub: TestHub,
    messages: Messages,
    channel_id: i64,
}

async fn room() -> Room {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    hub.add_member(community.id, ALICE, MemberRole::Member);
    hub.add_member(community.id, BOB, MemberRole::Member);
    let channel_id = hub.general_channel(community.id).id;
    let messages = hub.messages();
    Room {
        hub,
        messages,
        channel_id,
    }
}

fn text(content: &str) -> CreateMessageDto {
    CreateMessageDto {
        content: content.into(),
        reply_to: None,
    }
}

fn reply(content: &str, parent: &Message) -> CreateMessageDto {
    CreateMessageDto {
        content: content.into(),
        reply_to: Some(parent.id),
    }
}

#[tokio::test]
async fn test_non_member_cannot_post() {
    let room = room().await;
    let err = room
        .messages
        .send_message(room.channel_id, STRANGER, text("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::Forbidden));
}

#[tokio::test]
async fn test_blank_message_rejected() {
    let room = room().await;
    let err = room
        .messages
        .send_message(room.channel_id, ALICE, text("  \n "))
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::EmptyContent));
}

#[tokio::test]
async fn test_replies_form_two_level_thread() {
    let room = room().await;
    let m = &room.messages;

    let root = m.send_message(room.channel_id, ALICE, text("root")).await.unwrap();
    let first = m
        .send_message(room.channel_id, BOB, reply("first", &root))
        .await
        .unwrap();
    let second = m
        .send_message(room.channel_id, ALICE, reply("second", &first))
        .await
        .unwrap();
    let third = m
        .send_message(room.channel_id, BOB, reply("third", &second))
        .await
        .unwrap();

    assert_eq!(first.depth, 1);
    assert_eq!(second.depth, 2);
    assert_eq!(third.depth, 2);
    assert_eq!(third.reply_to_id, Some(second.id));
    for r in [&first, &second, &third] {
        assert_eq!(r.thread_root_id, Some(root.id));
    }

    let thread = m
        .list_thread(root.id, OWNER, MessageQueryDto::default())
        .await
        .unwrap();
    assert_eq!(thread.root.reply_count, 3);
    let ids: Vec<i64> = thread.replies.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id, third.id]);
    assert!(!thread.has_more);

    // Replies stay out of the channel's root listing.
    let page = m
        .list_messages(room.channel_id, OWNER, MessageQueryDto::default())
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].id, root.id);

    let events = room.hub.publisher.events_on(&format!("thread:{}", root.id));
    assert_eq!(
        events.iter().filter(|e| *e == "thread.reply_count").count(),
        3
    );
}

#[tokio::test]
async fn test_reply_to_other_channel_rejected() {
    let room = room().await;
    let root = room
        .messages
        .send_message(room.channel_id, ALICE, text("root"))
        .await
        .unwrap();

    let community_id = room.hub.store.tables().channels[&room.channel_id].community_id;
    let other = room
        .hub
        .channels()
        .create_channel(
            community_id,
            OWNER,
            CreateChannelDto {
                name: "random".into(),
                topic: None,
            },
        )
        .await
        .unwrap();

    let err = room
        .messages
        .send_message(other.id, ALICE, reply("nope", &root))
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::Thread(ThreadError::ChannelMismatch)));
}

#[tokio::test]
async fn test_roots_paginate_newest_first() {
    let room = room().await;
    let mut sent = Vec::new();
    for i in 0..5 {
        let msg = room
            .messages
            .send_message(room.channel_id, ALICE, text(&format!("m{}", i)))
            .await
            .unwrap();
        sent.push(msg.id);
    }

    let latest = room
        .messages
        .list_messages(
            room.channel_id,
            BOB,
            MessageQueryDto {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<i64> = latest.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![sent[4], sent[3]]);
    assert!(latest.has_more);

    let older = room
        .messages
        .list_messages(
            room.channel_id,
            BOB,
            MessageQueryDto {
                before: Some(sent[3]),
                limit: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<i64> = older.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![sent[2], sent[1], sent[0]]);
    assert!(!older.has_more);
}

#[tokio::test]
async fn test_edit_is_author_only() {
    let room = room().await;
    let msg = room
        .messages
        .send_message(room.channel_id, ALICE, text("draft"))
        .await
        .unwrap();

    let err = room
        .messages
        .edit_message(msg.id, OWNER, "hijack".into())
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::Forbidden));

    let edited = room
        .messages
        .edit_message(msg.id, ALICE, "final".into())
        .await
        .unwrap();
    assert_eq!(edited.content, "final");
    assert!(edited.is_edited());
}

#[tokio::test]
async fn test_deleted_root_with_replies_stays_as_placeholder() {
    let room = room().await;
    let m = &room.messages;
    let root = m.send_message(room.channel_id, ALICE, text("root")).await.unwrap();
    let r1 = m
        .send_message(room.channel_id, BOB, reply("r1", &root))
        .await
        .unwrap();

    // Moderators delete anyone's message.
    let deleted = m.delete_message(root.id, OWNER).await.unwrap();
    assert!(deleted.is_deleted());
    assert_eq!(deleted.content, "");

    let page = m
        .list_messages(room.channel_id, BOB, MessageQueryDto::default())
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert!(page.messages[0].is_deleted());

    // Deleting the last reply hides the placeholder.
    m.delete_message(r1.id, BOB).await.unwrap();
    let page = m
        .list_messages(room.channel_id, BOB, MessageQueryDto::default())
        .await
        .unwrap();
    assert!(page.messages.is_empty());

    let err = m
        .list_thread(root.id, BOB, MessageQueryDto::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::NotFound));
}

#[tokio::test]
async fn test_delete_is_idempotent_and_decrements_once() {
    let room = room().await;
    let m = &room.messages;
    let root = m.send_message(room.channel_id, ALICE, text("root")).await.unwrap();
    let r1 = m
        .send_message(room.channel_id, BOB, reply("r1", &root))
        .await
        .unwrap();
    m.send_message(room.channel_id, BOB, reply("r2", &root))
        .await
        .unwrap();

    m.delete_message(r1.id, BOB).await.unwrap();
    m.delete_message(r1.id, BOB).await.unwrap();

    let root = m.get_message(root.id, ALICE).await.unwrap();
    assert_eq!(root.reply_count, 1);

    let err = m
        .send_message(room.channel_id, ALICE, reply("late", &r1))
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::Thread(ThreadError::ParentDeleted)));
}

#[tokio::test]
async fn test_channel_pins_need_moderator() {
    let room = room().await;
    let m = &room.messages;
    let msg = m.send_message(room.channel_id, ALICE, text("rules")).await.unwrap();

    let err = m
        .pin_message(msg.id, ALICE, PinScope::Channel)
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::Forbidden));

    let pinned = m.pin_message(msg.id, OWNER, PinScope::Channel).await.unwrap();
    assert!(pinned.pinned_in_channel);
    let pins = m.list_pinned(room.channel_id, BOB).await.unwrap();
    assert_eq!(pins.len(), 1);

    m.unpin_message(msg.id, OWNER, PinScope::Channel).await.unwrap();
    assert!(m.list_pinned(room.channel_id, BOB).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_thread_starter_pins_replies() {
    let room = room().await;
    let m = &room.messages;
    let root = m.send_message(room.channel_id, ALICE, text("root")).await.unwrap();
    let answer = m
        .send_message(room.channel_id, BOB, reply("answer", &root))
        .await
        .unwrap();

    let err = m
        .pin_message(root.id, ALICE, PinScope::Thread)
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::NotAReply));

    let err = m
        .pin_message(answer.id, BOB, PinScope::Thread)
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::Forbidden));

    m.pin_message(answer.id, ALICE, PinScope::Thread).await.unwrap();
    let pins = m.list_thread_pinned(root.id, BOB).await.unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].id, answer.id);

    // Deleting clears pins.
    m.delete_message(answer.id, BOB).await.unwrap();
    assert!(m.list_thread_pinned(root.id, BOB).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unread_counts_follow_read_cursor() {
    let room = room().await;
    let m = &room.messages;

    m.send_message(room.channel_id, ALICE, text("one")).await.unwrap();
    m.send_message(room.channel_id, ALICE, text("two")).await.unwrap();
    // Own messages never count.
    m.send_message(room.channel_id, BOB, text("mine")).await.unwrap();

    let unread = m.unread_count(room.channel_id, BOB).await.unwrap();
    assert_eq!(unread.count, 2);
    assert_eq!(unread.last_read_at, None);

    let state = m.mark_read(room.channel_id, BOB, None).await.unwrap();
    let unread = m.unread_count(room.channel_id, BOB).await.unwrap();
    assert_eq!(unread.count, 0);
    assert_eq!(unread.last_read_at, Some(state.last_read_at));

    // The cursor never moves backwards.
    let earlier = state.last_read_at - chrono::Duration::minutes(10);
    let again = m.mark_read(room.channel_id, BOB, Some(earlier)).await.unwrap();
    assert_eq!(again.last_read_at, state.last_read_at);

    m.send_message(room.channel_id, ALICE, text("three")).await.unwrap();
    let unread = m.unread_count(room.channel_id, BOB).await.unwrap();
    assert_eq!(unread.count, 1);
}

#[tokio::test]
async fn test_archived_channel_is_read_only() {
    let room = room().await;
    let m = &room.messages;
    let msg = m.send_message(room.channel_id, ALICE, text("before")).await.unwrap();

    room.hub
        .channels()
        .archive_channel(room.channel_id, OWNER, true)
        .await
        .unwrap();

    let err = m
        .send_message(room.channel_id, ALICE, text("after"))
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::ChannelArchived));
    let err = m
        .edit_message(msg.id, ALICE, "edit".into())
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::ChannelArchived));

    let page = m
        .list_messages(room.channel_id, BOB, MessageQueryDto::default())
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
}
