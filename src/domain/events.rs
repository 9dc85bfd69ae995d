//! Realtime events and broker channel names.
//!
//! Every mutation publishes one of these on the channel(s) returned by
//! [`channels`]. The wire form is adjacently tagged:
//! `{"name": "message.created", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    Channel, Community, Member, Message, PinScope, Rsvp, RsvpTally,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum RealtimeEvent {
    // Community events
    #[serde(rename = "community.updated")]
    CommunityUpdated(Community),
    #[serde(rename = "community.deleted")]
    CommunityDeleted { community_id: i64 },
    #[serde(rename = "member.joined")]
    MemberJoined(Member),
    #[serde(rename = "member.updated")]
    MemberUpdated(Member),
    #[serde(rename = "member.left")]
    MemberLeft { community_id: i64, user_id: i64 },

    // Channel events
    #[serde(rename = "channel.created")]
    ChannelCreated(Channel),
    #[serde(rename = "channel.updated")]
    ChannelUpdated(Channel),
    #[serde(rename = "channel.deleted")]
    ChannelDeleted { community_id: i64, channel_id: i64 },
    #[serde(rename = "channel.read")]
    ChannelRead {
        channel_id: i64,
        user_id: i64,
        last_read_at: DateTime<Utc>,
    },

    // Message events
    #[serde(rename = "message.created")]
    MessageCreated(Message),
    #[serde(rename = "message.updated")]
    MessageUpdated(Message),
    #[serde(rename = "message.deleted")]
    MessageDeleted(Message),
    #[serde(rename = "message.pinned")]
    MessagePinned { message: Message, scope: PinScope },
    #[serde(rename = "message.unpinned")]
    MessageUnpinned { message: Message, scope: PinScope },
    #[serde(rename = "thread.reply_count")]
    ThreadReplyCount {
        channel_id: i64,
        root_id: i64,
        reply_count: i32,
    },

    // Forum events
    #[serde(rename = "post.created")]
    PostCreated { community_id: i64, post_id: i64 },
    #[serde(rename = "post.updated")]
    PostUpdated { community_id: i64, post_id: i64 },
    #[serde(rename = "post.deleted")]
    PostDeleted { community_id: i64, post_id: i64 },
    #[serde(rename = "post.voted")]
    PostVoted {
        post_id: i64,
        score: i32,
        upvotes: i32,
        downvotes: i32,
    },
    #[serde(rename = "comment.created")]
    CommentCreated { post_id: i64, comment_id: i64 },
    #[serde(rename = "comment.updated")]
    CommentUpdated { post_id: i64, comment_id: i64 },
    #[serde(rename = "comment.deleted")]
    CommentDeleted { post_id: i64, comment_id: i64 },

    // Document events
    #[serde(rename = "document.updated")]
    DocumentUpdated {
        document_id: i64,
        version: i32,
        title: String,
        content_hash: String,
        edited_by: i64,
    },
    #[serde(rename = "document.deleted")]
    DocumentDeleted { document_id: i64 },

    // Event events
    #[serde(rename = "event.updated")]
    EventUpdated { event_id: i64, status: String },
    #[serde(rename = "rsvp.updated")]
    RsvpUpdated {
        event_id: i64,
        rsvp: Rsvp,
        tally: RsvpTally,
    },
}

impl RealtimeEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommunityUpdated(_) => "community.updated",
            Self::CommunityDeleted { .. } => "community.deleted",
            Self::MemberJoined(_) => "member.joined",
            Self::MemberUpdated(_) => "member.updated",
            Self::MemberLeft { .. } => "member.left",
            Self::ChannelCreated(_) => "channel.created",
            Self::ChannelUpdated(_) => "channel.updated",
            Self::ChannelDeleted { .. } => "channel.deleted",
            Self::ChannelRead { .. } => "channel.read",
            Self::MessageCreated(_) => "message.created",
            Self::MessageUpdated(_) => "message.updated",
            Self::MessageDeleted(_) => "message.deleted",
            Self::MessagePinned { .. } => "message.pinned",
            Self::MessageUnpinned { .. } => "message.unpinned",
            Self::ThreadReplyCount { .. } => "thread.reply_count",
            Self::PostCreated { .. } => "post.created",
            Self::PostUpdated { .. } => "post.updated",
            Self::PostDeleted { .. } => "post.deleted",
            Self::PostVoted { .. } => "post.voted",
            Self::CommentCreated { .. } => "comment.created",
            Self::CommentUpdated { .. } => "comment.updated",
            Self::CommentDeleted { .. } => "comment.deleted",
            Self::DocumentUpdated { .. } => "document.updated",
            Self::DocumentDeleted { .. } => "document.deleted",
            Self::EventUpdated { .. } => "event.updated",
            Self::RsvpUpdated { .. } => "rsvp.updated",
        }
    }
}

/// Published wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEnvelope {
    #[serde(flatten)]
    pub event: RealtimeEvent,
    pub published_at: DateTime<Utc>,
}

impl RealtimeEnvelope {
    pub fn now(event: RealtimeEvent) -> Self {
        Self {
            event,
            published_at: Utc::now(),
        }
    }
}

/// Broker channel names.
pub mod channels {
    pub fn community(id: i64) -> String {
        format!("community:{}", id)
    }

    pub fn channel(id: i64) -> String {
        format!("channel:{}", id)
    }

    pub fn thread(root_id: i64) -> String {
        format!("thread:{}", root_id)
    }

    pub fn post(id: i64) -> String {
        format!("post:{}", id)
    }

    pub fn document(id: i64) -> String {
        format!("document:{}", id)
    }

    pub fn event(id: i64) -> String {
        format!("event:{}", id)
    }

    pub fn user(id: i64) -> String {
        format!("user:{}", id)
    }
}

/// A parsed broker channel name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Community(i64),
    Channel(i64),
    Thread(i64),
    Post(i64),
    Document(i64),
    Event(i64),
    User(i64),
}

impl Scope {
    /// Parse `kind:id`.
    pub fn parse(name: &str) -> Option<Self> {
        let (kind, id) = name.split_once(':')?;
        let id: i64 = id.parse().ok()?;
        let scope = match kind {
            "community" => Self::Community(id),
            "channel" => Self::Channel(id),
            "thread" => Self::Thread(id),
            "post" => Self::Post(id),
            "document" => Self::Document(id),
            "event" => Self::Event(id),
            "user" => Self::User(id),
            _ => return None,
        };
        Some(scope)
    }

    pub fn name(&self) -> String {
        match *self {
            Self::Community(id) => channels::community(id),
            Self::Channel(id) => channels::channel(id),
            Self::Thread(id) => channels::thread(id),
            Self::Post(id) => channels::post(id),
            Self::Document(id) => channels::document(id),
            Self::Event(id) => channels::event(id),
            Self::User(id) => channels::user(id),
        }
    }
}
