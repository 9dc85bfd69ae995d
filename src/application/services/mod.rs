//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ProfileService**: Public profiles and a user's communities
//! - **CommunityService**: Communities and memberships
//! - **ChannelService**: Chat channels and unread counts
//! - **MessageService**: Messages, threads, pins and read state
//! - **ForumService**: Posts, votes and comments
//! - **DocumentService**: Versioned documents and revisions
//! - **EventService**: Events, RSVPs and the waitlist
//! - **RealtimeService**: Broker capability tokens and subscription checks
//! - **Notifier**: Best-effort realtime fan-out and cache revalidation

pub mod channel_service;
pub mod community_service;
pub mod document_service;
pub mod event_service;
pub mod forum_service;
pub mod message_service;
pub mod notifier;
pub mod profile_service;
pub mod realtime_service;

pub use channel_service::{
    ChannelError, ChannelService, ChannelServiceImpl, ChannelSummary, CreateChannelDto,
    UpdateChannelDto,
};
pub use community_service::{
    CommunityDetail, CommunityError, CommunityService, CommunityServiceImpl, CreateCommunityDto,
    MemberQueryDto, UpdateCommunityDto, DEFAULT_CHANNEL_NAME,
};
pub use document_service::{
    CreateDocumentDto, DocumentError, DocumentService, DocumentServiceImpl, DocumentSummary,
    RevisionSummary, UpdateDocumentDto,
};
pub use event_service::{
    CreateEventDto, EventError, EventService, EventServiceImpl, EventView, RsvpOutcome,
    UpdateEventDto,
};
pub use forum_service::{
    CreateCommentDto, CreatePostDto, ForumError, ForumService, ForumServiceImpl, PostQueryDto,
    PostView, UpdatePostDto,
};
pub use message_service::{
    CreateMessageDto, MessageError, MessagePage, MessageQueryDto, MessageService,
    MessageServiceImpl, ThreadPage,
};
pub use notifier::{tags, Notifier, RealtimePublisher, Revalidator};
pub use profile_service::{ProfileError, ProfileService, ProfileServiceImpl};
pub use realtime_service::{
    RealtimeClaims, RealtimeError, RealtimeService, RealtimeServiceImpl, RealtimeToken,
    ScopeResolver, REALTIME_AUDIENCE,
};
