//! Community Service
//!
//! Community lifecycle and membership management.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::application::services::notifier::{tags, Notifier};
use crate::domain::events::{channels, RealtimeEvent};
use crate::domain::services::PermissionService;
use crate::domain::{
    Channel, Community, CommunityRepository, Member, MemberRepository, MemberRole, MemberStatus,
    Visibility,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Name of the channel every new community starts with.
pub const DEFAULT_CHANNEL_NAME: &str = "general";

/// Community service trait
#[async_trait]
pub trait CommunityService: Send + Sync {
    /// Create a community; the creator becomes its owner
    async fn create_community(
        &self,
        owner_id: i64,
        request: CreateCommunityDto,
    ) -> Result<CommunityDetail, CommunityError>;

    async fn get_community(&self, community_id: i64, viewer_id: i64) -> Result<CommunityDetail, CommunityError>;

    async fn get_community_by_slug(&self, slug: &str, viewer_id: i64) -> Result<CommunityDetail, CommunityError>;

    /// Update settings (owner only)
    async fn update_community(
        &self,
        community_id: i64,
        actor_id: i64,
        update: UpdateCommunityDto,
    ) -> Result<Community, CommunityError>;

    /// Delete the community and everything in it (owner only)
    async fn delete_community(&self, community_id: i64, actor_id: i64) -> Result<(), CommunityError>;

    /// Join; private communities put the request on hold
    async fn join_community(&self, community_id: i64, user_id: i64) -> Result<Member, CommunityError>;

    async fn leave_community(&self, community_id: i64, user_id: i64) -> Result<(), CommunityError>;

    /// Approve a pending join request (moderators)
    async fn approve_member(
        &self,
        community_id: i64,
        actor_id: i64,
        user_id: i64,
    ) -> Result<Member, CommunityError>;

    /// Promote or demote a member (owner only)
    async fn set_member_role(
        &self,
        community_id: i64,
        actor_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<Member, CommunityError>;

    async fn remove_member(&self, community_id: i64, actor_id: i64, user_id: i64) -> Result<(), CommunityError>;

    /// Ban keeps the row so the user cannot rejoin
    async fn ban_member(&self, community_id: i64, actor_id: i64, user_id: i64) -> Result<Member, CommunityError>;

    async fn list_members(
        &self,
        community_id: i64,
        viewer_id: i64,
        query: MemberQueryDto,
    ) -> Result<Vec<Member>, CommunityError>;
}

/// Create community request
#[derive(Debug, Clone)]
pub struct CreateCommunityDto {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub visibility: Visibility,
}

/// Update community request. `Some("")` clears the description.
#[derive(Debug, Clone, Default)]
pub struct UpdateCommunityDto {
    pub name: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Member listing query
#[derive(Debug, Clone, Default)]
pub struct MemberQueryDto {
    pub status: Option<MemberStatus>,
    pub after: Option<i64>,
    pub limit: Option<i32>,
}

/// Community with the viewer's membership
#[derive(Debug, Clone, Serialize)]
pub struct CommunityDetail {
    #[serde(flatten)]
    pub community: Community,
    pub member_count: i64,
    pub membership: Option<Member>,
}

/// Community service errors
#[derive(Debug, thiserror::Error)]
pub enum CommunityError {
    #[error("Community not found")]
    NotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Slug already taken")]
    SlugTaken,

    #[error("Already a member")]
    AlreadyMember,

    #[error("You are banned from this community")]
    Banned,

    #[error("The owner cannot leave the community")]
    OwnerCannotLeave,

    #[error("No pending request for this user")]
    NotPending,

    #[error("The owner's role cannot be changed")]
    CannotChangeOwner,

    #[error("Invalid role")]
    InvalidRole,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<CommunityError> for AppError {
    fn from(e: CommunityError) -> Self {
        match e {
            CommunityError::NotFound | CommunityError::MemberNotFound => {
                AppError::NotFound(e.to_string())
            }
            CommunityError::SlugTaken | CommunityError::AlreadyMember => {
                AppError::Conflict(e.to_string())
            }
            CommunityError::Banned | CommunityError::Forbidden => AppError::Forbidden(e.to_string()),
            CommunityError::OwnerCannotLeave
            | CommunityError::NotPending
            | CommunityError::CannotChangeOwner
            | CommunityError::InvalidRole => AppError::BadRequest(e.to_string()),
            CommunityError::Repository(inner) => inner,
        }
    }
}

const DEFAULT_MEMBER_PAGE: i32 = 50;
const MAX_MEMBER_PAGE: i32 = 200;

/// CommunityService implementation
pub struct CommunityServiceImpl<C, M>
where
    C: CommunityRepository,
    M: MemberRepository,
{
    community_repo: Arc<C>,
    member_repo: Arc<M>,
    id_generator: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl<C, M> CommunityServiceImpl<C, M>
where
    C: CommunityRepository,
    M: MemberRepository,
{
    pub fn new(
        community_repo: Arc<C>,
        member_repo: Arc<M>,
        id_generator: Arc<SnowflakeGenerator>,
        notifier: Notifier,
    ) -> Self {
        Self {
            community_repo,
            member_repo,
            id_generator,
            notifier,
        }
    }

    async fn find_community(&self, community_id: i64) -> Result<Community, CommunityError> {
        self.community_repo
            .find_by_id(community_id)
            .await?
            .ok_or(CommunityError::NotFound)
    }

    async fn find_member(&self, community_id: i64, user_id: i64) -> Result<Member, CommunityError> {
        self.member_repo
            .find(community_id, user_id)
            .await?
            .ok_or(CommunityError::MemberNotFound)
    }

    async fn detail(&self, community: Community, viewer_id: i64) -> Result<CommunityDetail, CommunityError> {
        let member_count = self.member_repo.count_active(community.id).await?;
        let membership = self.member_repo.find(community.id, viewer_id).await?;
        Ok(CommunityDetail {
            community,
            member_count,
            membership,
        })
    }

    async fn member_changed(&self, event: RealtimeEvent, community_id: i64) {
        self.notifier
            .publish(&[channels::community(community_id)], event)
            .await;
        self.notifier.revalidate(&[tags::community(community_id)]).await;
    }
}

#[async_trait]
impl<C, M> CommunityService for CommunityServiceImpl<C, M>
where
    C: CommunityRepository + 'static,
    M: MemberRepository + 'static,
{
    async fn create_community(
        &self,
        owner_id: i64,
        request: CreateCommunityDto,
    ) -> Result<CommunityDetail, CommunityError> {
        let slug = request.slug.trim().to_lowercase();
        if self.community_repo.find_by_slug(&slug).await?.is_some() {
            return Err(CommunityError::SlugTaken);
        }

        let now = Utc::now();
        let community = Community {
            id: self.id_generator.generate(),
            slug,
            name: request.name.trim().to_string(),
            description: request.description.filter(|d| !d.trim().is_empty()),
            visibility: request.visibility,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        let general = Channel {
            id: self.id_generator.generate(),
            community_id: community.id,
            name: DEFAULT_CHANNEL_NAME.to_string(),
            topic: None,
            event_id: None,
            position: 0,
            archived: false,
            created_by: owner_id,
            created_at: now,
            updated_at: now,
        };
        let created = self.community_repo.create(&community, &general).await?;

        tracing::info!(community_id = created.id, owner_id, slug = %created.slug, "Community created");
        self.detail(created, owner_id).await
    }

    async fn get_community(&self, community_id: i64, viewer_id: i64) -> Result<CommunityDetail, CommunityError> {
        let community = self.find_community(community_id).await?;
        self.detail(community, viewer_id).await
    }

    async fn get_community_by_slug(&self, slug: &str, viewer_id: i64) -> Result<CommunityDetail, CommunityError> {
        let community = self
            .community_repo
            .find_by_slug(&slug.to_lowercase())
            .await?
            .ok_or(CommunityError::NotFound)?;
        self.detail(community, viewer_id).await
    }

    async fn update_community(
        &self,
        community_id: i64,
        actor_id: i64,
        update: UpdateCommunityDto,
    ) -> Result<Community, CommunityError> {
        let mut community = self.find_community(community_id).await?;
        let actor = self.member_repo.find(community_id, actor_id).await?;
        if !PermissionService::can_manage_community(actor.as_ref()) {
            return Err(CommunityError::Forbidden);
        }

        if let Some(name) = update.name {
            community.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            let trimmed = description.trim();
            community.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(visibility) = update.visibility {
            community.visibility = visibility;
        }
        community.updated_at = Utc::now();

        let updated = self.community_repo.update(&community).await?;

        self.notifier
            .publish(
                &[channels::community(community_id)],
                RealtimeEvent::CommunityUpdated(updated.clone()),
            )
            .await;
        self.notifier.revalidate(&[tags::community(community_id)]).await;

        Ok(updated)
    }

    async fn delete_community(&self, community_id: i64, actor_id: i64) -> Result<(), CommunityError> {
        self.find_community(community_id).await?;
        let actor = self.member_repo.find(community_id, actor_id).await?;
        if !PermissionService::can_manage_community(actor.as_ref()) {
            return Err(CommunityError::Forbidden);
        }

        self.community_repo.delete(community_id).await?;
        tracing::info!(community_id, actor_id, "Community deleted");

        self.notifier
            .publish(
                &[channels::community(community_id)],
                RealtimeEvent::CommunityDeleted { community_id },
            )
            .await;
        self.notifier
            .revalidate(&[tags::community(community_id), tags::community_posts(community_id)])
            .await;
        Ok(())
    }

    async fn join_community(&self, community_id: i64, user_id: i64) -> Result<Member, CommunityError> {
        let community = self.find_community(community_id).await?;

        if let Some(existing) = self.member_repo.find(community_id, user_id).await? {
            return Err(match existing.status {
                MemberStatus::Banned => CommunityError::Banned,
                MemberStatus::Active | MemberStatus::Pending => CommunityError::AlreadyMember,
            });
        }

        let mut member = Member::new(community_id, user_id);
        if community.visibility == Visibility::Private {
            member.status = MemberStatus::Pending;
        }
        let member = self.member_repo.create(&member).await?;

        tracing::info!(community_id, user_id, status = member.status.as_str(), "Member joined");
        self.member_changed(RealtimeEvent::MemberJoined(member.clone()), community_id)
            .await;
        Ok(member)
    }

    async fn leave_community(&self, community_id: i64, user_id: i64) -> Result<(), CommunityError> {
        let member = self.find_member(community_id, user_id).await?;
        if member.role == MemberRole::Owner {
            return Err(CommunityError::OwnerCannotLeave);
        }
        if member.status == MemberStatus::Banned {
            // Leaving would lift the ban.
            return Err(CommunityError::Banned);
        }

        self.member_repo.delete(community_id, user_id).await?;
        self.member_changed(RealtimeEvent::MemberLeft { community_id, user_id }, community_id)
            .await;
        Ok(())
    }

    async fn approve_member(
        &self,
        community_id: i64,
        actor_id: i64,
        user_id: i64,
    ) -> Result<Member, CommunityError> {
        let actor = self.member_repo.find(community_id, actor_id).await?;
        if !PermissionService::can_moderate(actor.as_ref()) {
            return Err(CommunityError::Forbidden);
        }

        let mut member = self.find_member(community_id, user_id).await?;
        if member.status != MemberStatus::Pending {
            return Err(CommunityError::NotPending);
        }
        member.status = MemberStatus::Active;
        member.joined_at = Utc::now();
        let member = self.member_repo.update(&member).await?;

        self.member_changed(RealtimeEvent::MemberUpdated(member.clone()), community_id)
            .await;
        Ok(member)
    }

    async fn set_member_role(
        &self,
        community_id: i64,
        actor_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<Member, CommunityError> {
        let actor = self.member_repo.find(community_id, actor_id).await?;
        if !PermissionService::can_manage_community(actor.as_ref()) {
            return Err(CommunityError::Forbidden);
        }
        if role == MemberRole::Owner {
            return Err(CommunityError::InvalidRole);
        }

        let mut member = self.find_member(community_id, user_id).await?;
        if member.role == MemberRole::Owner {
            return Err(CommunityError::CannotChangeOwner);
        }
        if !member.is_active() {
            return Err(CommunityError::MemberNotFound);
        }
        if member.role == role {
            return Ok(member);
        }

        member.role = role;
        let member = self.member_repo.update(&member).await?;

        tracing::info!(community_id, user_id, role = role.as_str(), "Member role changed");
        self.member_changed(RealtimeEvent::MemberUpdated(member.clone()), community_id)
            .await;
        Ok(member)
    }

    async fn remove_member(&self, community_id: i64, actor_id: i64, user_id: i64) -> Result<(), CommunityError> {
        let actor = self.member_repo.find(community_id, actor_id).await?;
        let target = self.find_member(community_id, user_id).await?;
        if !PermissionService::can_act_on_member(actor.as_ref(), &target) {
            return Err(CommunityError::Forbidden);
        }

        self.member_repo.delete(community_id, user_id).await?;
        tracing::info!(community_id, actor_id, user_id, "Member removed");
        self.member_changed(RealtimeEvent::MemberLeft { community_id, user_id }, community_id)
            .await;
        Ok(())
    }

    async fn ban_member(&self, community_id: i64, actor_id: i64, user_id: i64) -> Result<Member, CommunityError> {
        let actor = self.member_repo.find(community_id, actor_id).await?;
        let mut target = self.find_member(community_id, user_id).await?;
        if !PermissionService::can_act_on_member(actor.as_ref(), &target) {
            return Err(CommunityError::Forbidden);
        }
        if target.status == MemberStatus::Banned {
            return Ok(target);
        }

        target.status = MemberStatus::Banned;
        target.role = MemberRole::Member;
        let target = self.member_repo.update(&target).await?;

        tracing::info!(community_id, actor_id, user_id, "Member banned");
        self.member_changed(RealtimeEvent::MemberUpdated(target.clone()), community_id)
            .await;
        Ok(target)
    }

    async fn list_members(
        &self,
        community_id: i64,
        viewer_id: i64,
        query: MemberQueryDto,
    ) -> Result<Vec<Member>, CommunityError> {
        let community = self.find_community(community_id).await?;
        let viewer = self.member_repo.find(community_id, viewer_id).await?;

        if community.visibility == Visibility::Private
            && !PermissionService::is_active_member(viewer.as_ref())
        {
            return Err(CommunityError::Forbidden);
        }
        let status = query.status.unwrap_or(MemberStatus::Active);
        if status != MemberStatus::Active && !PermissionService::can_moderate(viewer.as_ref()) {
            return Err(CommunityError::Forbidden);
        }

        let limit = query
            .limit
            .unwrap_or(DEFAULT_MEMBER_PAGE)
            .clamp(1, MAX_MEMBER_PAGE);
        Ok(self
            .member_repo
            .find_by_community(community_id, Some(status), query.after, limit)
            .await?)
    }
}
