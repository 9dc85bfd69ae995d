//! Channel Service
//!
//! Handles channel management and per-channel unread counts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::application::services::message_service::unread_since;
use crate::application::services::notifier::{tags, Notifier};
use crate::domain::events::{channels, RealtimeEvent};
use crate::domain::services::PermissionService;
use crate::domain::{
    normalize_channel_name, Channel, ChannelRepository, Member, MemberRepository,
    MessageRepository, ReadStateRepository, UnreadCount,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Channel service trait
#[async_trait]
pub trait ChannelService: Send + Sync {
    /// Create a new channel in a community (moderators)
    async fn create_channel(
        &self,
        community_id: i64,
        actor_id: i64,
        request: CreateChannelDto,
    ) -> Result<Channel, ChannelError>;

    /// Get channel by ID
    async fn get_channel(&self, channel_id: i64, actor_id: i64) -> Result<Channel, ChannelError>;

    /// Update name, topic or position (moderators)
    async fn update_channel(
        &self,
        channel_id: i64,
        actor_id: i64,
        update: UpdateChannelDto,
    ) -> Result<Channel, ChannelError>;

    /// Archive or unarchive (moderators)
    async fn archive_channel(&self, channel_id: i64, actor_id: i64, archived: bool) -> Result<Channel, ChannelError>;

    /// Delete channel (moderators). Event channels can only be archived.
    async fn delete_channel(&self, channel_id: i64, actor_id: i64) -> Result<(), ChannelError>;

    /// Channels of a community with the actor's unread counts
    async fn list_channels(&self, community_id: i64, actor_id: i64) -> Result<Vec<ChannelSummary>, ChannelError>;

    /// Unread counts for every channel of a community
    async fn unread_counts(&self, community_id: i64, actor_id: i64) -> Result<Vec<UnreadCount>, ChannelError>;
}

/// Create channel request
#[derive(Debug, Clone)]
pub struct CreateChannelDto {
    pub name: String,
    pub topic: Option<String>,
}

/// Update channel request. `Some("")` clears the topic.
#[derive(Debug, Clone, Default)]
pub struct UpdateChannelDto {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: Option<i32>,
}

/// Channel with the viewer's unread count
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    #[serde(flatten)]
    pub channel: Channel,
    pub unread_count: i64,
}

/// Channel service errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel not found")]
    NotFound,

    #[error("A channel with this name already exists")]
    NameTaken,

    #[error("Event channels can only be archived")]
    EventChannel,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ChannelError> for AppError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::NotFound => AppError::NotFound(e.to_string()),
            ChannelError::NameTaken => AppError::Conflict(e.to_string()),
            ChannelError::EventChannel => AppError::BadRequest(e.to_string()),
            ChannelError::Forbidden => AppError::Forbidden(e.to_string()),
            ChannelError::Repository(inner) => inner,
        }
    }
}

/// ChannelService implementation
pub struct ChannelServiceImpl<Ch, M, Msg, R>
where
    Ch: ChannelRepository,
    M: MemberRepository,
    Msg: MessageRepository,
    R: ReadStateRepository,
{
    channel_repo: Arc<Ch>,
    member_repo: Arc<M>,
    message_repo: Arc<Msg>,
    read_state_repo: Arc<R>,
    id_generator: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl<Ch, M, Msg, R> ChannelServiceImpl<Ch, M, Msg, R>
where
    Ch: ChannelRepository,
    M: MemberRepository,
    Msg: MessageRepository,
    R: ReadStateRepository,
{
    pub fn new(
        channel_repo: Arc<Ch>,
        member_repo: Arc<M>,
        message_repo: Arc<Msg>,
        read_state_repo: Arc<R>,
        id_generator: Arc<SnowflakeGenerator>,
        notifier: Notifier,
    ) -> Self {
        Self {
            channel_repo,
            member_repo,
            message_repo,
            read_state_repo,
            id_generator,
            notifier,
        }
    }

    async fn load_channel(&self, channel_id: i64) -> Result<Channel, ChannelError> {
        self.channel_repo
            .find_by_id(channel_id)
            .await?
            .ok_or(ChannelError::NotFound)
    }

    async fn require_moderator(&self, community_id: i64, actor_id: i64) -> Result<(), ChannelError> {
        let member = self.member_repo.find(community_id, actor_id).await?;
        if !PermissionService::can_moderate(member.as_ref()) {
            return Err(ChannelError::Forbidden);
        }
        Ok(())
    }

    async fn require_member(&self, community_id: i64, actor_id: i64) -> Result<Member, ChannelError> {
        match self.member_repo.find(community_id, actor_id).await? {
            Some(m) if m.is_active() => Ok(m),
            _ => Err(ChannelError::Forbidden),
        }
    }

    async fn ensure_name_free(&self, community_id: i64, name: &str, except: Option<i64>) -> Result<(), ChannelError> {
        let taken = self
            .channel_repo
            .find_by_community(community_id)
            .await?
            .iter()
            .any(|c| c.name == name && Some(c.id) != except);
        if taken {
            return Err(ChannelError::NameTaken);
        }
        Ok(())
    }

    async fn counts_for(&self, channels: &[Channel], member: &Member) -> Result<Vec<UnreadCount>, ChannelError> {
        let ids: Vec<i64> = channels.iter().map(|c| c.id).collect();
        let states: HashMap<i64, _> = self
            .read_state_repo
            .find_for_channels(member.user_id, &ids)
            .await?
            .into_iter()
            .map(|s| (s.channel_id, s))
            .collect();

        let mut counts = Vec::with_capacity(channels.len());
        for channel in channels {
            let state = states.get(&channel.id);
            let count = self
                .message_repo
                .count_unread(channel.id, member.user_id, unread_since(state, member))
                .await?;
            counts.push(UnreadCount {
                channel_id: channel.id,
                count,
                last_read_at: state.map(|s| s.last_read_at),
            });
        }
        Ok(counts)
    }

    async fn announce(&self, event: RealtimeEvent, community_id: i64) {
        self.notifier
            .publish(&[channels::community(community_id)], event)
            .await;
        self.notifier.revalidate(&[tags::community(community_id)]).await;
    }
}

#[async_trait]
impl<Ch, M, Msg, R> ChannelService for ChannelServiceImpl<Ch, M, Msg, R>
where
    Ch: ChannelRepository + 'static,
    M: MemberRepository + 'static,
    Msg: MessageRepository + 'static,
    R: ReadStateRepository + 'static,
{
    async fn create_channel(
        &self,
        community_id: i64,
        actor_id: i64,
        request: CreateChannelDto,
    ) -> Result<Channel, ChannelError> {
        self.require_moderator(community_id, actor_id).await?;

        let name = normalize_channel_name(&request.name);
        self.ensure_name_free(community_id, &name, None).await?;

        let now = Utc::now();
        let channel = Channel {
            id: self.id_generator.generate(),
            community_id,
            name,
            topic: request.topic.filter(|t| !t.trim().is_empty()),
            event_id: None,
            position: self.channel_repo.next_position(community_id).await?,
            archived: false,
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };

        let created = self.channel_repo.create(&channel).await?;
        tracing::info!(channel_id = created.id, community_id, actor_id, "Channel created");

        self.announce(RealtimeEvent::ChannelCreated(created.clone()), community_id)
            .await;
        Ok(created)
    }

    async fn get_channel(&self, channel_id: i64, actor_id: i64) -> Result<Channel, ChannelError> {
        let channel = self.load_channel(channel_id).await?;
        self.require_member(channel.community_id, actor_id).await?;
        Ok(channel)
    }

    async fn update_channel(
        &self,
        channel_id: i64,
        actor_id: i64,
        update: UpdateChannelDto,
    ) -> Result<Channel, ChannelError> {
        let mut channel = self.load_channel(channel_id).await?;
        self.require_moderator(channel.community_id, actor_id).await?;

        if let Some(name) = update.name {
            let name = normalize_channel_name(&name);
            if name != channel.name {
                self.ensure_name_free(channel.community_id, &name, Some(channel.id))
                    .await?;
                channel.name = name;
            }
        }
        if let Some(topic) = update.topic {
            let trimmed = topic.trim();
            channel.topic = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(position) = update.position {
            channel.position = position.max(0);
        }
        channel.updated_at = Utc::now();

        let updated = self.channel_repo.update(&channel).await?;
        self.announce(
            RealtimeEvent::ChannelUpdated(updated.clone()),
            updated.community_id,
        )
        .await;
        Ok(updated)
    }

    async fn archive_channel(&self, channel_id: i64, actor_id: i64, archived: bool) -> Result<Channel, ChannelError> {
        let mut channel = self.load_channel(channel_id).await?;
        self.require_moderator(channel.community_id, actor_id).await?;

        if channel.archived == archived {
            return Ok(channel);
        }
        channel.archived = archived;
        channel.updated_at = Utc::now();

        let updated = self.channel_repo.update(&channel).await?;
        tracing::info!(channel_id, actor_id, archived, "Channel archive state changed");

        self.announce(
            RealtimeEvent::ChannelUpdated(updated.clone()),
            updated.community_id,
        )
        .await;
        Ok(updated)
    }

    async fn delete_channel(&self, channel_id: i64, actor_id: i64) -> Result<(), ChannelError> {
        let channel = self.load_channel(channel_id).await?;
        self.require_moderator(channel.community_id, actor_id).await?;
        if channel.is_event_channel() {
            return Err(ChannelError::EventChannel);
        }

        self.channel_repo.delete(channel_id).await?;
        tracing::info!(channel_id, actor_id, "Channel deleted");

        self.announce(
            RealtimeEvent::ChannelDeleted {
                community_id: channel.community_id,
                channel_id,
            },
            channel.community_id,
        )
        .await;
        Ok(())
    }

    async fn list_channels(&self, community_id: i64, actor_id: i64) -> Result<Vec<ChannelSummary>, ChannelError> {
        let member = self.require_member(community_id, actor_id).await?;
        let channels = self.channel_repo.find_by_community(community_id).await?;
        let counts = self.counts_for(&channels, &member).await?;

        Ok(channels
            .into_iter()
            .zip(counts)
            .map(|(channel, unread)| ChannelSummary {
                channel,
                unread_count: unread.count,
            })
            .collect())
    }

    async fn unread_counts(&self, community_id: i64, actor_id: i64) -> Result<Vec<UnreadCount>, ChannelError> {
        let member = self.require_member(community_id, actor_id).await?;
        let channels = self.channel_repo.find_by_community(community_id).await?;
        self.counts_for(&channels, &member).await
    }
}
