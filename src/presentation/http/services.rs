//! Per-request service wiring.
//!
//! Repositories are cheap `PgPool` clones, so handlers build the service they
//! need for every request.

use std::sync::Arc;

use chrono::Duration;

use crate::application::services::{
    ChannelServiceImpl, CommunityServiceImpl, DocumentServiceImpl, EventServiceImpl,
    ForumServiceImpl, MessageServiceImpl, ProfileServiceImpl, RealtimeServiceImpl,
};
use crate::infrastructure::repositories::{
    PgChannelRepository, PgCommentRepository, PgCommunityRepository, PgDocumentRepository,
    PgEventRepository, PgMemberRepository, PgMessageRepository, PgPostRepository,
    PgReadStateRepository, PgScopeResolver, PgUserRepository,
};
use crate::startup::AppState;

pub type PgProfileService = ProfileServiceImpl<PgUserRepository, PgCommunityRepository>;
pub type PgCommunityService = CommunityServiceImpl<PgCommunityRepository, PgMemberRepository>;
pub type PgChannelService = ChannelServiceImpl<
    PgChannelRepository,
    PgMemberRepository,
    PgMessageRepository,
    PgReadStateRepository,
>;
pub type PgMessageService = MessageServiceImpl<
    PgChannelRepository,
    PgMemberRepository,
    PgMessageRepository,
    PgReadStateRepository,
>;
pub type PgForumService = ForumServiceImpl<
    PgPostRepository,
    PgCommentRepository,
    PgCommunityRepository,
    PgMemberRepository,
>;
pub type PgDocumentService =
    DocumentServiceImpl<PgDocumentRepository, PgCommunityRepository, PgMemberRepository>;
pub type PgEventService = EventServiceImpl<
    PgEventRepository,
    PgChannelRepository,
    PgCommunityRepository,
    PgMemberRepository,
>;
pub type PgRealtimeService =
    RealtimeServiceImpl<PgMemberRepository, PgChannelRepository, PgScopeResolver>;

pub fn profile_service(state: &AppState) -> PgProfileService {
    ProfileServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgCommunityRepository::new(state.db.clone())),
    )
}

pub fn community_service(state: &AppState) -> PgCommunityService {
    CommunityServiceImpl::new(
        Arc::new(PgCommunityRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.notifier.clone(),
    )
}

pub fn channel_service(state: &AppState) -> PgChannelService {
    ChannelServiceImpl::new(
        Arc::new(PgChannelRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        Arc::new(PgMessageRepository::new(state.db.clone())),
        Arc::new(PgReadStateRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.notifier.clone(),
    )
}

pub fn message_service(state: &AppState) -> PgMessageService {
    MessageServiceImpl::new(
        Arc::new(PgChannelRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        Arc::new(PgMessageRepository::new(state.db.clone())),
        Arc::new(PgReadStateRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.notifier.clone(),
    )
}

pub fn forum_service(state: &AppState) -> PgForumService {
    ForumServiceImpl::new(
        Arc::new(PgPostRepository::new(state.db.clone())),
        Arc::new(PgCommentRepository::new(state.db.clone())),
        Arc::new(PgCommunityRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.notifier.clone(),
    )
}

pub fn document_service(state: &AppState) -> PgDocumentService {
    DocumentServiceImpl::new(
        Arc::new(PgDocumentRepository::new(state.db.clone())),
        Arc::new(PgCommunityRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.notifier.clone(),
    )
}

pub fn event_service(state: &AppState) -> PgEventService {
    EventServiceImpl::new(
        Arc::new(PgEventRepository::new(state.db.clone())),
        Arc::new(PgChannelRepository::new(state.db.clone())),
        Arc::new(PgCommunityRepository::new(state.db.clone())),
        Arc::new(PgMemberRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.notifier.clone(),
    )
}

pub fn realtime_service(state: &AppState) -> PgRealtimeService {
    RealtimeServiceImpl::new(
        Arc::new(PgMemberRepository::new(state.db.clone())),
        Arc::new(PgChannelRepository::new(state.db.clone())),
        Arc::new(PgScopeResolver::new(state.db.clone())),
        state.settings.jwt.secret.clone(),
        Duration::seconds(state.settings.realtime.token_ttl_secs),
    )
}
