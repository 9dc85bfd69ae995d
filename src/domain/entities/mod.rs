//! # Domain Entities
//!
//! Core domain entities representing the main business objects of the
//! community platform. All entities map directly to their database tables.
//!
//! ## Core Entities
//!
//! - **User**: Public profile of an account owned by the identity provider
//! - **Community**: A group with members, channels, a forum, documents and events
//! - **Member**: A user's membership (role and status) in a community
//! - **Channel**: A chat room within a community, optionally bound to an event
//! - **Message**: A chat message, either a thread root or a reply
//! - **ReadState**: Per-user read cursor for a channel
//!
//! ## Forum, Documents, Events
//!
//! - **Post** / **Comment**: Voting forum
//! - **Document**: Collaboratively edited text with revisions
//! - **Event** / **Rsvp**: Scheduled events with capacity and waitlist
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod channel;
mod comment;
mod community;
mod document;
mod event;
mod member;
mod message;
mod post;
mod read_state;
mod user;

pub use channel::{
    normalize_channel_name, unique_channel_name, Channel, ChannelRepository, MAX_CHANNEL_NAME_LENGTH,
};
pub use comment::{Comment, CommentRepository, MAX_COMMENT_DEPTH};
pub use community::{Community, CommunityRepository, Visibility};
pub use document::{
    content_hash, Document, DocumentRepository, DocumentRevision, EditPolicy, MAX_DOCUMENT_LENGTH,
};
pub use event::{
    free_seats, Event, EventRepository, EventStatus, Rsvp, RsvpChange, RsvpStatus, RsvpTally,
};
pub use member::{Member, MemberRepository, MemberRole, MemberStatus};
pub use message::{
    DeleteOutcome, Message, MessageRepository, PinScope, MAX_MESSAGE_LENGTH, MAX_THREAD_DEPTH,
};
pub use post::{
    hot_rank, Post, PostRepository, PostSort, VoteDelta, VoteValue, HOT_RANK_DECAY_SECONDS,
};
pub use read_state::{ReadState, ReadStateRepository, UnreadCount};
pub use user::{ProfilePatch, User, UserRepository};
