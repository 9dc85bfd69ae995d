//! Forum Service
//!
//! Posts, votes and nested comments. Listings are cached per community, so
//! every mutation revalidates the community's post tag and the post's own.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::application::services::notifier::{tags, Notifier};
use crate::domain::events::{channels, RealtimeEvent};
use crate::domain::services::PermissionService;
use crate::domain::{
    Comment, CommentRepository, Community, CommunityRepository, Member, MemberRepository, Post,
    PostRepository, PostSort, Visibility, VoteValue, MAX_COMMENT_DEPTH,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

pub const DEFAULT_POSTS_PER_PAGE: i32 = 25;
pub const MAX_POSTS_PER_PAGE: i32 = 100;

/// Forum service trait
#[async_trait]
pub trait ForumService: Send + Sync {
    async fn create_post(&self, community_id: i64, author_id: i64, request: CreatePostDto) -> Result<Post, ForumError>;

    async fn get_post(&self, post_id: i64, viewer_id: i64) -> Result<PostView, ForumError>;

    /// Fails unless the viewer may read the community's forum
    async fn check_viewer(&self, community_id: i64, viewer_id: i64) -> Result<(), ForumError>;

    /// Pinned posts first, then by `sort`
    async fn list_posts(&self, community_id: i64, viewer_id: i64, query: PostQueryDto) -> Result<Vec<Post>, ForumError>;

    /// Author only; locked posts are frozen
    async fn edit_post(&self, post_id: i64, actor_id: i64, update: UpdatePostDto) -> Result<Post, ForumError>;

    async fn delete_post(&self, post_id: i64, actor_id: i64) -> Result<Post, ForumError>;

    async fn lock_post(&self, post_id: i64, actor_id: i64, locked: bool) -> Result<Post, ForumError>;

    async fn pin_post(&self, post_id: i64, actor_id: i64, pinned: bool) -> Result<Post, ForumError>;

    /// Set, flip or clear the actor's vote
    async fn vote(&self, post_id: i64, user_id: i64, value: VoteValue) -> Result<Post, ForumError>;

    async fn add_comment(&self, post_id: i64, author_id: i64, request: CreateCommentDto) -> Result<Comment, ForumError>;

    async fn edit_comment(&self, comment_id: i64, actor_id: i64, body: String) -> Result<Comment, ForumError>;

    async fn delete_comment(&self, comment_id: i64, actor_id: i64) -> Result<Comment, ForumError>;

    /// All comments in creation order; deleted ones have an empty body
    async fn list_comments(&self, post_id: i64, viewer_id: i64) -> Result<Vec<Comment>, ForumError>;
}

/// Create post request
#[derive(Debug, Clone)]
pub struct CreatePostDto {
    pub title: String,
    pub body: String,
}

/// Update post request
#[derive(Debug, Clone, Default)]
pub struct UpdatePostDto {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Post listing query; `page` starts at 1
#[derive(Debug, Clone, Default)]
pub struct PostQueryDto {
    pub sort: PostSort,
    pub page: Option<i64>,
    pub per_page: Option<i32>,
}

impl PostQueryDto {
    pub fn per_page(&self) -> i32 {
        self.per_page
            .unwrap_or(DEFAULT_POSTS_PER_PAGE)
            .clamp(1, MAX_POSTS_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page.unwrap_or(1).max(1) - 1).saturating_mul(i64::from(self.per_page()))
    }
}

/// Create comment request
#[derive(Debug, Clone)]
pub struct CreateCommentDto {
    pub body: String,
    pub parent_id: Option<i64>,
}

/// Post with the viewer's vote
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub my_vote: VoteValue,
}

/// Forum service errors
#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("Community not found")]
    CommunityNotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Post is locked")]
    Locked,

    #[error("Comment has been deleted")]
    CommentDeleted,

    #[error("Parent comment belongs to another post")]
    ParentMismatch,

    #[error("Comments cannot nest deeper than {MAX_COMMENT_DEPTH} levels")]
    TooDeep,

    #[error("Comment cannot be empty")]
    EmptyBody,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ForumError> for AppError {
    fn from(e: ForumError) -> Self {
        match e {
            ForumError::CommunityNotFound | ForumError::PostNotFound | ForumError::CommentNotFound => {
                AppError::NotFound(e.to_string())
            }
            ForumError::Locked | ForumError::Forbidden => AppError::Forbidden(e.to_string()),
            ForumError::EmptyBody => AppError::Validation(e.to_string()),
            ForumError::CommentDeleted | ForumError::ParentMismatch | ForumError::TooDeep => {
                AppError::BadRequest(e.to_string())
            }
            ForumError::Repository(inner) => inner,
        }
    }
}

/// ForumService implementation
pub struct ForumServiceImpl<P, Cm, C, M>
where
    P: PostRepository,
    Cm: CommentRepository,
    C: CommunityRepository,
    M: MemberRepository,
{
    post_repo: Arc<P>,
    comment_repo: Arc<Cm>,
    community_repo: Arc<C>,
    member_repo: Arc<M>,
    id_generator: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl<P, Cm, C, M> ForumServiceImpl<P, Cm, C, M>
where
    P: PostRepository,
    Cm: CommentRepository,
    C: CommunityRepository,
    M: MemberRepository,
{
    pub fn new(
        post_repo: Arc<P>,
        comment_repo: Arc<Cm>,
        community_repo: Arc<C>,
        member_repo: Arc<M>,
        id_generator: Arc<SnowflakeGenerator>,
        notifier: Notifier,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            community_repo,
            member_repo,
            id_generator,
            notifier,
        }
    }

    async fn load_community(&self, community_id: i64) -> Result<Community, ForumError> {
        self.community_repo
            .find_by_id(community_id)
            .await?
            .ok_or(ForumError::CommunityNotFound)
    }

    /// Non-deleted post.
    async fn load_post(&self, post_id: i64) -> Result<Post, ForumError> {
        self.post_repo
            .find_by_id(post_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or(ForumError::PostNotFound)
    }

    async fn load_comment(&self, comment_id: i64) -> Result<Comment, ForumError> {
        self.comment_repo
            .find_by_id(comment_id)
            .await?
            .ok_or(ForumError::CommentNotFound)
    }

    async fn membership(&self, community_id: i64, user_id: i64) -> Result<Option<Member>, ForumError> {
        Ok(self.member_repo.find(community_id, user_id).await?)
    }

    async fn require_member(&self, community_id: i64, user_id: i64) -> Result<Member, ForumError> {
        match self.membership(community_id, user_id).await? {
            Some(m) if m.is_active() => Ok(m),
            _ => Err(ForumError::Forbidden),
        }
    }

    /// Public forums are readable by anyone signed in; private ones by members.
    async fn require_viewer(&self, community_id: i64, viewer_id: i64) -> Result<(), ForumError> {
        let community = self.load_community(community_id).await?;
        if community.visibility == Visibility::Public {
            return Ok(());
        }
        self.require_member(community_id, viewer_id).await.map(|_| ())
    }

    async fn require_moderator(&self, community_id: i64, actor_id: i64) -> Result<(), ForumError> {
        let member = self.membership(community_id, actor_id).await?;
        if !PermissionService::can_moderate(member.as_ref()) {
            return Err(ForumError::Forbidden);
        }
        Ok(())
    }

    async fn post_changed(&self, post: &Post, event: RealtimeEvent) {
        self.notifier.publish(&[channels::post(post.id)], event).await;
        self.notifier
            .revalidate(&[tags::community_posts(post.community_id), tags::post(post.id)])
            .await;
    }

    async fn comment_changed(&self, post_id: i64, community_id: i64, event: RealtimeEvent) {
        self.notifier.publish(&[channels::post(post_id)], event).await;
        self.notifier
            .revalidate(&[tags::community_posts(community_id), tags::post(post_id)])
            .await;
    }

    fn check_body(body: &str) -> Result<(), ForumError> {
        if body.trim().is_empty() {
            return Err(ForumError::EmptyBody);
        }
        Ok(())
    }
}

#[async_trait]
impl<P, Cm, C, M> ForumService for ForumServiceImpl<P, Cm, C, M>
where
    P: PostRepository + 'static,
    Cm: CommentRepository + 'static,
    C: CommunityRepository + 'static,
    M: MemberRepository + 'static,
{
    async fn create_post(&self, community_id: i64, author_id: i64, request: CreatePostDto) -> Result<Post, ForumError> {
        self.load_community(community_id).await?;
        self.require_member(community_id, author_id).await?;

        let post = Post {
            id: self.id_generator.generate(),
            community_id,
            author_id,
            title: request.title.trim().to_string(),
            body: request.body,
            score: 0,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            locked: false,
            pinned: false,
            edited_at: None,
            deleted_at: None,
            created_at: Utc::now(),
        };
        let created = self.post_repo.create(&post).await?;

        tracing::info!(post_id = created.id, community_id, author_id, "Post created");
        self.notifier
            .publish(
                &[channels::community(community_id)],
                RealtimeEvent::PostCreated {
                    community_id,
                    post_id: created.id,
                },
            )
            .await;
        self.notifier
            .revalidate(&[tags::community_posts(community_id)])
            .await;
        Ok(created)
    }

    async fn get_post(&self, post_id: i64, viewer_id: i64) -> Result<PostView, ForumError> {
        let post = self.load_post(post_id).await?;
        self.require_viewer(post.community_id, viewer_id).await?;
        let my_vote = self.post_repo.find_vote(post_id, viewer_id).await?;
        Ok(PostView { post, my_vote })
    }

    async fn check_viewer(&self, community_id: i64, viewer_id: i64) -> Result<(), ForumError> {
        self.require_viewer(community_id, viewer_id).await
    }

    async fn list_posts(&self, community_id: i64, viewer_id: i64, query: PostQueryDto) -> Result<Vec<Post>, ForumError> {
        self.require_viewer(community_id, viewer_id).await?;
        Ok(self
            .post_repo
            .find_by_community(community_id, query.sort, query.offset(), query.per_page())
            .await?)
    }

    async fn edit_post(&self, post_id: i64, actor_id: i64, update: UpdatePostDto) -> Result<Post, ForumError> {
        let mut post = self.load_post(post_id).await?;
        let member = self.membership(post.community_id, actor_id).await?;
        if !PermissionService::can_edit_own(post.author_id, actor_id, member.as_ref()) {
            return Err(ForumError::Forbidden);
        }
        if post.locked {
            return Err(ForumError::Locked);
        }

        if let Some(title) = update.title {
            post.title = title.trim().to_string();
        }
        if let Some(body) = update.body {
            post.body = body;
        }
        post.edited_at = Some(Utc::now());

        let updated = self.post_repo.update(&post).await?;
        let event = RealtimeEvent::PostUpdated {
            community_id: updated.community_id,
            post_id,
        };
        self.post_changed(&updated, event).await;
        Ok(updated)
    }

    async fn delete_post(&self, post_id: i64, actor_id: i64) -> Result<Post, ForumError> {
        let post = self
            .post_repo
            .find_by_id(post_id)
            .await?
            .ok_or(ForumError::PostNotFound)?;
        let member = self.membership(post.community_id, actor_id).await?;
        if !PermissionService::can_delete(post.author_id, actor_id, member.as_ref()) {
            return Err(ForumError::Forbidden);
        }
        if post.is_deleted() {
            return Ok(post);
        }

        let deleted = self.post_repo.soft_delete(post_id).await?;
        tracing::info!(post_id, actor_id, "Post deleted");

        let event = RealtimeEvent::PostDeleted {
            community_id: deleted.community_id,
            post_id,
        };
        self.notifier
            .publish(
                &[channels::post(post_id), channels::community(deleted.community_id)],
                event,
            )
            .await;
        self.notifier
            .revalidate(&[tags::community_posts(deleted.community_id), tags::post(post_id)])
            .await;
        Ok(deleted)
    }

    async fn lock_post(&self, post_id: i64, actor_id: i64, locked: bool) -> Result<Post, ForumError> {
        let mut post = self.load_post(post_id).await?;
        self.require_moderator(post.community_id, actor_id).await?;
        if post.locked == locked {
            return Ok(post);
        }

        post.locked = locked;
        let updated = self.post_repo.update(&post).await?;
        tracing::info!(post_id, actor_id, locked, "Post lock changed");

        let event = RealtimeEvent::PostUpdated {
            community_id: updated.community_id,
            post_id,
        };
        self.post_changed(&updated, event).await;
        Ok(updated)
    }

    async fn pin_post(&self, post_id: i64, actor_id: i64, pinned: bool) -> Result<Post, ForumError> {
        let mut post = self.load_post(post_id).await?;
        self.require_moderator(post.community_id, actor_id).await?;
        if post.pinned == pinned {
            return Ok(post);
        }

        post.pinned = pinned;
        let updated = self.post_repo.update(&post).await?;

        let event = RealtimeEvent::PostUpdated {
            community_id: updated.community_id,
            post_id,
        };
        self.post_changed(&updated, event).await;
        Ok(updated)
    }

    async fn vote(&self, post_id: i64, user_id: i64, value: VoteValue) -> Result<Post, ForumError> {
        let post = self.load_post(post_id).await?;
        self.require_member(post.community_id, user_id).await?;
        if !post.accepts_interaction() {
            return Err(ForumError::Locked);
        }

        let updated = self.post_repo.set_vote(post_id, user_id, value).await?;
        tracing::debug!(post_id, user_id, score = updated.score, "Vote recorded");

        let event = RealtimeEvent::PostVoted {
            post_id,
            score: updated.score,
            upvotes: updated.upvotes,
            downvotes: updated.downvotes,
        };
        self.post_changed(&updated, event).await;
        Ok(updated)
    }

    async fn add_comment(&self, post_id: i64, author_id: i64, request: CreateCommentDto) -> Result<Comment, ForumError> {
        let post = self.load_post(post_id).await?;
        self.require_member(post.community_id, author_id).await?;
        if !post.accepts_interaction() {
            return Err(ForumError::Locked);
        }
        Self::check_body(&request.body)?;

        let depth = match request.parent_id {
            None => 0,
            Some(parent_id) => {
                let parent = self.load_comment(parent_id).await?;
                if parent.post_id != post_id {
                    return Err(ForumError::ParentMismatch);
                }
                if parent.is_deleted() {
                    return Err(ForumError::CommentDeleted);
                }
                if parent.depth >= MAX_COMMENT_DEPTH {
                    return Err(ForumError::TooDeep);
                }
                parent.depth + 1
            }
        };

        let comment = Comment {
            id: self.id_generator.generate(),
            post_id,
            author_id,
            parent_id: request.parent_id,
            depth,
            body: request.body,
            edited_at: None,
            deleted_at: None,
            created_at: Utc::now(),
        };
        let created = self.comment_repo.create(&comment).await?;

        let event = RealtimeEvent::CommentCreated {
            post_id,
            comment_id: created.id,
        };
        self.comment_changed(post_id, post.community_id, event).await;
        Ok(created)
    }

    async fn edit_comment(&self, comment_id: i64, actor_id: i64, body: String) -> Result<Comment, ForumError> {
        let comment = self.load_comment(comment_id).await?;
        let post = self.load_post(comment.post_id).await?;
        let member = self.membership(post.community_id, actor_id).await?;
        if !PermissionService::can_edit_own(comment.author_id, actor_id, member.as_ref()) {
            return Err(ForumError::Forbidden);
        }
        if comment.is_deleted() {
            return Err(ForumError::CommentDeleted);
        }
        if post.locked {
            return Err(ForumError::Locked);
        }
        Self::check_body(&body)?;

        let updated = self.comment_repo.update_body(comment_id, &body).await?;
        let event = RealtimeEvent::CommentUpdated {
            post_id: post.id,
            comment_id,
        };
        self.comment_changed(post.id, post.community_id, event).await;
        Ok(updated)
    }

    async fn delete_comment(&self, comment_id: i64, actor_id: i64) -> Result<Comment, ForumError> {
        let comment = self.load_comment(comment_id).await?;
        let post = self
            .post_repo
            .find_by_id(comment.post_id)
            .await?
            .ok_or(ForumError::PostNotFound)?;
        let member = self.membership(post.community_id, actor_id).await?;
        if !PermissionService::can_delete(comment.author_id, actor_id, member.as_ref()) {
            return Err(ForumError::Forbidden);
        }

        let (deleted, newly_deleted) = self.comment_repo.soft_delete(comment_id).await?;
        if newly_deleted {
            let event = RealtimeEvent::CommentDeleted {
                post_id: post.id,
                comment_id,
            };
            self.comment_changed(post.id, post.community_id, event).await;
        }
        Ok(deleted)
    }

    async fn list_comments(&self, post_id: i64, viewer_id: i64) -> Result<Vec<Comment>, ForumError> {
        let post = self.load_post(post_id).await?;
        self.require_viewer(post.community_id, viewer_id).await?;

        let mut comments = self.comment_repo.find_by_post(post_id).await?;
        for comment in comments.iter_mut().filter(|c| c.is_deleted()) {
            comment.body.clear();
        }
        Ok(comments)
    }
}
