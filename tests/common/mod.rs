//! Common Test Utilities
//!
//! An in-memory store implementing every repository trait, recording
//! realtime and cache collaborators, and a harness that wires the
//! application services over them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use parking_lot::{Mutex, MutexGuard};

use community_hub::application::services::{
    ChannelServiceImpl, CommunityDetail, CommunityService, CommunityServiceImpl,
    CreateCommunityDto, DocumentServiceImpl, EventServiceImpl, ForumServiceImpl,
    MessageServiceImpl, Notifier, ProfileServiceImpl, RealtimePublisher, RealtimeServiceImpl,
    Revalidator, ScopeResolver,
};
use community_hub::domain::{
    free_seats, Channel, ChannelRepository, Comment, CommentRepository, Community,
    CommunityRepository, DeleteOutcome, Document, DocumentRepository, DocumentRevision, Event,
    EventRepository, Member, MemberRepository, MemberRole, MemberStatus, Message,
    MessageRepository, PinScope, Post, PostRepository, PostSort, ReadState, ReadStateRepository,
    RealtimeEnvelope, Rsvp, RsvpChange, RsvpStatus, RsvpTally, Scope, User, UserRepository,
    Visibility, VoteDelta, VoteValue, MAX_CHANNEL_NAME_LENGTH,
};
use community_hub::shared::error::AppError;
use community_hub::shared::snowflake::{SnowflakeGenerator, DEFAULT_EPOCH};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Rows held by [`MemoryStore`]. Snowflake ids grow over time, so maps
/// keyed by id iterate in creation order.
#[derive(Default)]
pub struct Tables {
    pub users: BTreeMap<i64, User>,
    pub communities: BTreeMap<i64, Community>,
    pub members: BTreeMap<(i64, i64), Member>,
    pub channels: BTreeMap<i64, Channel>,
    pub messages: BTreeMap<i64, Message>,
    pub read_states: HashMap<(i64, i64), ReadState>,
    pub posts: BTreeMap<i64, Post>,
    pub votes: HashMap<(i64, i64), VoteValue>,
    pub comments: BTreeMap<i64, Comment>,
    pub documents: BTreeMap<i64, Document>,
    pub revisions: BTreeMap<(i64, i32), DocumentRevision>,
    pub events: BTreeMap<i64, Event>,
    pub rsvps: BTreeMap<(i64, i64), Rsvp>,
}

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock()
    }
}

impl Tables {
    /// Channel write holding the constraints of the `channels` table:
    /// VARCHAR(100) names, unique per community.
    fn put_channel(&mut self, channel: &Channel) -> Result<(), AppError> {
        if channel.name.chars().count() > MAX_CHANNEL_NAME_LENGTH {
            return Err(AppError::Internal(format!(
                "channel name too long: {}",
                channel.name
            )));
        }
        let clash = self.channels.values().any(|c| {
            c.id != channel.id && c.community_id == channel.community_id && c.name == channel.name
        });
        if clash {
            return Err(AppError::Conflict("Channel name already in use".into()));
        }
        self.channels.insert(channel.id, channel.clone());
        Ok(())
    }
}

fn not_found(what: &str) -> AppError {
    AppError::NotFound(format!("{} not found", what))
}

fn page<T>(items: impl Iterator<Item = T>, limit: i32) -> Vec<T> {
    items.take(limit.max(1) as usize).collect()
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn create_if_missing(&self, user: &User) -> Result<User, AppError> {
        let mut t = self.tables();
        if let Some(existing) = t.users.get(&user.id) {
            return Ok(existing.clone());
        }
        // UNIQUE (username)
        if t.users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(AppError::Conflict("Username already taken".into()));
        }
        t.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut t = self.tables();
        let clash = t
            .users
            .values()
            .any(|u| u.id != user.id && u.username.eq_ignore_ascii_case(&user.username));
        if clash {
            return Err(AppError::Conflict("Username already taken".into()));
        }
        let slot = t.users.get_mut(&user.id).ok_or_else(|| not_found("User"))?;
        *slot = user.clone();
        Ok(user.clone())
    }
}

#[async_trait]
impl CommunityRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Community>, AppError> {
        Ok(self.tables().communities.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Community>, AppError> {
        Ok(self
            .tables()
            .communities
            .values()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Community>, AppError> {
        let t = self.tables();
        let mut memberships: Vec<&Member> = t
            .members
            .values()
            .filter(|m| m.user_id == user_id && m.is_active())
            .collect();
        memberships.sort_by_key(|m| m.joined_at);
        Ok(memberships
            .into_iter()
            .filter_map(|m| t.communities.get(&m.community_id).cloned())
            .collect())
    }

    async fn create(&self, community: &Community, general: &Channel) -> Result<Community, AppError> {
        let mut t = self.tables();
        if t.communities.values().any(|c| c.slug == community.slug) {
            return Err(AppError::Conflict("Slug already taken".into()));
        }
        t.put_channel(general)?;
        t.communities.insert(community.id, community.clone());
        t.members.insert(
            (community.id, community.owner_id),
            Member {
                community_id: community.id,
                user_id: community.owner_id,
                role: MemberRole::Owner,
                status: MemberStatus::Active,
                joined_at: community.created_at,
            },
        );
        Ok(community.clone())
    }

    async fn update(&self, community: &Community) -> Result<Community, AppError> {
        let mut t = self.tables();
        let slot = t
            .communities
            .get_mut(&community.id)
            .ok_or_else(|| not_found("Community"))?;
        *slot = community.clone();
        Ok(community.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut t = self.tables();
        t.communities.remove(&id).ok_or_else(|| not_found("Community"))?;

        t.members.retain(|(community_id, _), _| *community_id != id);
        let channel_ids: Vec<i64> = t
            .channels
            .values()
            .filter(|c| c.community_id == id)
            .map(|c| c.id)
            .collect();
        t.channels.retain(|_, c| c.community_id != id);
        t.messages.retain(|_, m| !channel_ids.contains(&m.channel_id));
        t.read_states.retain(|(_, channel_id), _| !channel_ids.contains(channel_id));

        let post_ids: Vec<i64> = t
            .posts
            .values()
            .filter(|p| p.community_id == id)
            .map(|p| p.id)
            .collect();
        t.posts.retain(|_, p| p.community_id != id);
        t.comments.retain(|_, c| !post_ids.contains(&c.post_id));
        t.votes.retain(|(post_id, _), _| !post_ids.contains(post_id));

        let document_ids: Vec<i64> = t
            .documents
            .values()
            .filter(|d| d.community_id == id)
            .map(|d| d.id)
            .collect();
        t.documents.retain(|_, d| d.community_id != id);
        t.revisions.retain(|(document_id, _), _| !document_ids.contains(document_id));

        let event_ids: Vec<i64> = t
            .events
            .values()
            .filter(|e| e.community_id == id)
            .map(|e| e.id)
            .collect();
        t.events.retain(|_, e| e.community_id != id);
        t.rsvps.retain(|(event_id, _), _| !event_ids.contains(event_id));
        Ok(())
    }
}

#[async_trait]
impl MemberRepository for MemoryStore {
    async fn find(&self, community_id: i64, user_id: i64) -> Result<Option<Member>, AppError> {
        Ok(self.tables().members.get(&(community_id, user_id)).cloned())
    }

    async fn find_by_community(
        &self,
        community_id: i64,
        status: Option<MemberStatus>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Member>, AppError> {
        let t = self.tables();
        let mut members: Vec<Member> = t
            .members
            .values()
            .filter(|m| m.community_id == community_id)
            .filter(|m| status.map_or(true, |s| m.status == s))
            .filter(|m| after.map_or(true, |a| m.user_id > a))
            .cloned()
            .collect();
        members.sort_by_key(|m| m.user_id);
        Ok(page(members.into_iter(), limit))
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Member>, AppError> {
        let mut members: Vec<Member> = self
            .tables()
            .members
            .values()
            .filter(|m| m.user_id == user_id && m.is_active())
            .cloned()
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn create(&self, member: &Member) -> Result<Member, AppError> {
        let mut t = self.tables();
        let key = (member.community_id, member.user_id);
        if t.members.contains_key(&key) {
            return Err(AppError::Conflict("Already a member".into()));
        }
        t.members.insert(key, member.clone());
        Ok(member.clone())
    }

    async fn update(&self, member: &Member) -> Result<Member, AppError> {
        let mut t = self.tables();
        let slot = t
            .members
            .get_mut(&(member.community_id, member.user_id))
            .ok_or_else(|| not_found("Member"))?;
        *slot = member.clone();
        Ok(member.clone())
    }

    async fn delete(&self, community_id: i64, user_id: i64) -> Result<(), AppError> {
        self.tables().members.remove(&(community_id, user_id));
        Ok(())
    }

    async fn count_active(&self, community_id: i64) -> Result<i64, AppError> {
        Ok(self
            .tables()
            .members
            .values()
            .filter(|m| m.community_id == community_id && m.is_active())
            .count() as i64)
    }
}

#[async_trait]
impl ChannelRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Channel>, AppError> {
        Ok(self.tables().channels.get(&id).cloned())
    }

    async fn find_by_community(&self, community_id: i64) -> Result<Vec<Channel>, AppError> {
        let mut channels: Vec<Channel> = self
            .tables()
            .channels
            .values()
            .filter(|c| c.community_id == community_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| (c.position, c.id));
        Ok(channels)
    }

    async fn find_by_event(&self, event_id: i64) -> Result<Option<Channel>, AppError> {
        Ok(self
            .tables()
            .channels
            .values()
            .find(|c| c.event_id == Some(event_id))
            .cloned())
    }

    async fn create(&self, channel: &Channel) -> Result<Channel, AppError> {
        self.tables().put_channel(channel)?;
        Ok(channel.clone())
    }

    async fn update(&self, channel: &Channel) -> Result<Channel, AppError> {
        let mut t = self.tables();
        if !t.channels.contains_key(&channel.id) {
            return Err(not_found("Channel"));
        }
        t.put_channel(channel)?;
        Ok(channel.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut t = self.tables();
        t.channels.remove(&id).ok_or_else(|| not_found("Channel"))?;
        t.messages.retain(|_, m| m.channel_id != id);
        t.read_states.retain(|(_, channel_id), _| *channel_id != id);
        Ok(())
    }

    async fn next_position(&self, community_id: i64) -> Result<i32, AppError> {
        Ok(self
            .tables()
            .channels
            .values()
            .filter(|c| c.community_id == community_id)
            .map(|c| c.position + 1)
            .max()
            .unwrap_or(0))
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.tables().messages.get(&id).cloned())
    }

    async fn find_roots(
        &self,
        channel_id: i64,
        before: Option<i64>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Message>, AppError> {
        let t = self.tables();
        let visible = t
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.is_visible_in_channel());
        let roots = match (before, after) {
            (Some(before), _) => page(visible.filter(|m| m.id < before).rev(), limit),
            (None, Some(after)) => page(visible.filter(|m| m.id > after), limit),
            (None, None) => page(visible.rev(), limit),
        };
        Ok(roots.into_iter().cloned().collect())
    }

    async fn find_replies(
        &self,
        root_id: i64,
        before: Option<i64>,
        after: Option<i64>,
        limit: i32,
    ) -> Result<Vec<Message>, AppError> {
        let t = self.tables();
        let replies = t
            .messages
            .values()
            .filter(|m| m.thread_root_id == Some(root_id));
        let replies = match (before, after) {
            (Some(before), _) => page(replies.filter(|m| m.id < before).rev(), limit),
            (None, Some(after)) => page(replies.filter(|m| m.id > after), limit),
            (None, None) => page(replies, limit),
        };
        Ok(replies.into_iter().cloned().collect())
    }

    async fn find_pinned_in_channel(&self, channel_id: i64) -> Result<Vec<Message>, AppError> {
        Ok(self
            .tables()
            .messages
            .values()
            .rev()
            .filter(|m| m.channel_id == channel_id && m.pinned_in_channel)
            .cloned()
            .collect())
    }

    async fn find_pinned_in_thread(&self, root_id: i64) -> Result<Vec<Message>, AppError> {
        Ok(self
            .tables()
            .messages
            .values()
            .filter(|m| m.thread_root_id == Some(root_id) && m.pinned_in_thread)
            .cloned()
            .collect())
    }

    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        self.tables().messages.insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn create_reply(&self, message: &Message) -> Result<(Message, i32), AppError> {
        let mut t = self.tables();
        let root_id = message
            .thread_root_id
            .ok_or_else(|| AppError::BadRequest("Reply without a thread root".into()))?;
        let root = t
            .messages
            .get_mut(&root_id)
            .ok_or_else(|| not_found("Thread root"))?;
        root.reply_count += 1;
        let count = root.reply_count;
        t.messages.insert(message.id, message.clone());
        Ok((message.clone(), count))
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Message, AppError> {
        let mut t = self.tables();
        let message = t
            .messages
            .get_mut(&id)
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| not_found("Message"))?;
        message.content = content.to_string();
        message.edited_at = Some(Utc::now());
        Ok(message.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<DeleteOutcome, AppError> {
        let mut t = self.tables();
        let message = t.messages.get_mut(&id).ok_or_else(|| not_found("Message"))?;
        if message.is_deleted() {
            return Ok(DeleteOutcome {
                message: message.clone(),
                newly_deleted: false,
                root_reply_count: None,
            });
        }

        message.content.clear();
        message.pinned_in_channel = false;
        message.pinned_in_thread = false;
        message.deleted_at = Some(Utc::now());
        let deleted = message.clone();

        let root_reply_count = match deleted.thread_root_id {
            Some(root_id) => t.messages.get_mut(&root_id).map(|root| {
                root.reply_count = (root.reply_count - 1).max(0);
                root.reply_count
            }),
            None => None,
        };

        Ok(DeleteOutcome {
            message: deleted,
            newly_deleted: true,
            root_reply_count,
        })
    }

    async fn set_pinned(&self, id: i64, scope: PinScope, pinned: bool) -> Result<Message, AppError> {
        let mut t = self.tables();
        let message = t.messages.get_mut(&id).ok_or_else(|| not_found("Message"))?;
        match scope {
            PinScope::Channel => message.pinned_in_channel = pinned,
            PinScope::Thread => message.pinned_in_thread = pinned,
        }
        Ok(message.clone())
    }

    async fn count_unread(
        &self,
        channel_id: i64,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        Ok(self
            .tables()
            .messages
            .values()
            .filter(|m| {
                m.channel_id == channel_id
                    && !m.is_deleted()
                    && m.author_id != user_id
                    && m.created_at > since
            })
            .count() as i64)
    }
}

#[async_trait]
impl ReadStateRepository for MemoryStore {
    async fn find(&self, user_id: i64, channel_id: i64) -> Result<Option<ReadState>, AppError> {
        Ok(self.tables().read_states.get(&(user_id, channel_id)).cloned())
    }

    async fn find_for_channels(
        &self,
        user_id: i64,
        channel_ids: &[i64],
    ) -> Result<Vec<ReadState>, AppError> {
        let t = self.tables();
        Ok(channel_ids
            .iter()
            .filter_map(|channel_id| t.read_states.get(&(user_id, *channel_id)).cloned())
            .collect())
    }

    async fn advance(
        &self,
        user_id: i64,
        channel_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ReadState, AppError> {
        let mut t = self.tables();
        let state = t
            .read_states
            .entry((user_id, channel_id))
            .or_insert_with(|| ReadState {
                user_id,
                channel_id,
                last_read_at: at,
            });
        state.last_read_at = state.last_read_at.max(at);
        Ok(state.clone())
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, AppError> {
        Ok(self.tables().posts.get(&id).cloned())
    }

    async fn find_by_community(
        &self,
        community_id: i64,
        sort: PostSort,
        offset: i64,
        limit: i32,
    ) -> Result<Vec<Post>, AppError> {
        let mut posts: Vec<Post> = self
            .tables()
            .posts
            .values()
            .filter(|p| p.community_id == community_id && !p.is_deleted())
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            let by_sort = match sort {
                PostSort::Hot => b.hot_rank().total_cmp(&a.hot_rank()),
                PostSort::New => std::cmp::Ordering::Equal,
                PostSort::Top => b.score.cmp(&a.score),
            };
            b.pinned
                .cmp(&a.pinned)
                .then(by_sort)
                .then(b.id.cmp(&a.id))
        });
        Ok(page(posts.into_iter().skip(offset.max(0) as usize), limit))
    }

    async fn create(&self, post: &Post) -> Result<Post, AppError> {
        self.tables().posts.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn update(&self, post: &Post) -> Result<Post, AppError> {
        let mut t = self.tables();
        let stored = t.posts.get_mut(&post.id).ok_or_else(|| not_found("Post"))?;
        stored.title = post.title.clone();
        stored.body = post.body.clone();
        stored.locked = post.locked;
        stored.pinned = post.pinned;
        stored.edited_at = post.edited_at;
        Ok(stored.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<Post, AppError> {
        let mut t = self.tables();
        let post = t.posts.get_mut(&id).ok_or_else(|| not_found("Post"))?;
        post.deleted_at.get_or_insert_with(Utc::now);
        Ok(post.clone())
    }

    async fn find_vote(&self, post_id: i64, user_id: i64) -> Result<VoteValue, AppError> {
        Ok(self
            .tables()
            .votes
            .get(&(post_id, user_id))
            .copied()
            .unwrap_or_default())
    }

    async fn set_vote(
        &self,
        post_id: i64,
        user_id: i64,
        value: VoteValue,
    ) -> Result<Post, AppError> {
        let mut t = self.tables();
        let old = t.votes.get(&(post_id, user_id)).copied().unwrap_or_default();
        let delta = VoteDelta::between(old, value);

        let post = t.posts.get_mut(&post_id).ok_or_else(|| not_found("Post"))?;
        post.upvotes += delta.upvotes;
        post.downvotes += delta.downvotes;
        post.score += delta.score();
        let post = post.clone();

        match value {
            VoteValue::None => {
                t.votes.remove(&(post_id, user_id));
            }
            v => {
                t.votes.insert((post_id, user_id), v);
            }
        }
        Ok(post)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, AppError> {
        Ok(self.tables().comments.get(&id).cloned())
    }

    async fn find_by_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        Ok(self
            .tables()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create(&self, comment: &Comment) -> Result<Comment, AppError> {
        let mut t = self.tables();
        let post = t
            .posts
            .get_mut(&comment.post_id)
            .ok_or_else(|| not_found("Post"))?;
        post.comment_count += 1;
        t.comments.insert(comment.id, comment.clone());
        Ok(comment.clone())
    }

    async fn update_body(&self, id: i64, body: &str) -> Result<Comment, AppError> {
        let mut t = self.tables();
        let comment = t
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| not_found("Comment"))?;
        comment.body = body.to_string();
        comment.edited_at = Some(Utc::now());
        Ok(comment.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<(Comment, bool), AppError> {
        let mut t = self.tables();
        let comment = t.comments.get_mut(&id).ok_or_else(|| not_found("Comment"))?;
        if comment.is_deleted() {
            return Ok((comment.clone(), false));
        }
        comment.deleted_at = Some(Utc::now());
        let deleted = comment.clone();
        if let Some(post) = t.posts.get_mut(&deleted.post_id) {
            post.comment_count = (post.comment_count - 1).max(0);
        }
        Ok((deleted, true))
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, AppError> {
        Ok(self.tables().documents.get(&id).cloned())
    }

    async fn find_by_community(&self, community_id: i64) -> Result<Vec<Document>, AppError> {
        let mut documents: Vec<Document> = self
            .tables()
            .documents
            .values()
            .filter(|d| d.community_id == community_id && !d.is_deleted())
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }

    async fn create(&self, document: &Document) -> Result<Document, AppError> {
        let mut t = self.tables();
        t.documents.insert(document.id, document.clone());
        t.revisions
            .insert((document.id, document.version), document.to_revision());
        Ok(document.clone())
    }

    async fn update_versioned(
        &self,
        document: &Document,
        expected_version: i32,
    ) -> Result<Option<Document>, AppError> {
        let mut t = self.tables();
        let stored = t
            .documents
            .get_mut(&document.id)
            .ok_or_else(|| not_found("Document"))?;
        if stored.version != expected_version {
            return Ok(None);
        }
        *stored = document.clone();
        t.revisions
            .insert((document.id, document.version), document.to_revision());
        Ok(Some(document.clone()))
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        let mut t = self.tables();
        let document = t.documents.get_mut(&id).ok_or_else(|| not_found("Document"))?;
        document.deleted_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    async fn find_revisions(&self, document_id: i64) -> Result<Vec<DocumentRevision>, AppError> {
        Ok(self
            .tables()
            .revisions
            .values()
            .rev()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn find_revision(
        &self,
        document_id: i64,
        version: i32,
    ) -> Result<Option<DocumentRevision>, AppError> {
        Ok(self.tables().revisions.get(&(document_id, version)).cloned())
    }
}

impl Tables {
    fn going(&self, event_id: i64, except: Option<i64>) -> i64 {
        self.rsvps
            .values()
            .filter(|r| r.event_id == event_id && r.status == RsvpStatus::Going)
            .filter(|r| Some(r.user_id) != except)
            .count() as i64
    }

    fn promote(&mut self, event_id: i64, capacity: Option<i32>) -> Vec<Rsvp> {
        let seats = free_seats(self.going(event_id, None), capacity);
        if seats == Some(0) {
            return Vec::new();
        }

        let mut waiting: Vec<(DateTime<Utc>, i64)> = self
            .rsvps
            .values()
            .filter(|r| r.event_id == event_id && r.status == RsvpStatus::Waitlisted)
            .map(|r| (r.responded_at, r.user_id))
            .collect();
        waiting.sort();
        if let Some(seats) = seats {
            waiting.truncate(seats as usize);
        }

        waiting
            .into_iter()
            .filter_map(|(_, user_id)| {
                let rsvp = self.rsvps.get_mut(&(event_id, user_id))?;
                rsvp.status = RsvpStatus::Going;
                Some(rsvp.clone())
            })
            .collect()
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>, AppError> {
        Ok(self.tables().events.get(&id).cloned())
    }

    async fn find_by_community(
        &self,
        community_id: i64,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, AppError> {
        let mut events: Vec<Event> = self
            .tables()
            .events
            .values()
            .filter(|e| e.community_id == community_id)
            .filter(|e| from.map_or(true, |from| e.ends_at.unwrap_or(e.starts_at) >= from))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.starts_at, e.id));
        Ok(events)
    }

    async fn create(&self, event: &Event, channel: &Channel) -> Result<(Event, Channel), AppError> {
        // Both rows or neither.
        let mut t = self.tables();
        t.put_channel(channel)?;
        t.events.insert(event.id, event.clone());
        Ok((event.clone(), channel.clone()))
    }

    async fn update(&self, event: &Event) -> Result<Event, AppError> {
        let mut t = self.tables();
        let slot = t.events.get_mut(&event.id).ok_or_else(|| not_found("Event"))?;
        *slot = event.clone();
        Ok(event.clone())
    }

    async fn find_rsvps(&self, event_id: i64) -> Result<Vec<Rsvp>, AppError> {
        let mut rsvps: Vec<Rsvp> = self
            .tables()
            .rsvps
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        rsvps.sort_by_key(|r| (r.responded_at, r.user_id));
        Ok(rsvps)
    }

    async fn tally(&self, event_id: i64) -> Result<RsvpTally, AppError> {
        let t = self.tables();
        Ok(RsvpTally::from_rsvps(
            t.rsvps.values().filter(|r| r.event_id == event_id),
        ))
    }

    async fn set_rsvp(
        &self,
        event_id: i64,
        user_id: i64,
        requested: RsvpStatus,
        capacity: Option<i32>,
    ) -> Result<RsvpChange, AppError> {
        let mut t = self.tables();
        if !t.events.contains_key(&event_id) {
            return Err(not_found("Event"));
        }

        let previous = t.rsvps.get(&(event_id, user_id)).map(|r| r.status);
        let going_others = t.going(event_id, Some(user_id));
        let status = RsvpStatus::resolve(requested, previous, going_others, capacity);

        let now = Utc::now();
        let rsvp = t
            .rsvps
            .entry((event_id, user_id))
            .and_modify(|r| {
                if r.status != status {
                    r.status = status;
                    r.responded_at = now;
                }
            })
            .or_insert(Rsvp {
                event_id,
                user_id,
                status,
                responded_at: now,
            })
            .clone();

        let promoted = if previous == Some(RsvpStatus::Going) && status != RsvpStatus::Going {
            t.promote(event_id, capacity)
        } else {
            Vec::new()
        };
        Ok(RsvpChange { rsvp, promoted })
    }

    async fn promote_waitlisted(
        &self,
        event_id: i64,
        capacity: Option<i32>,
    ) -> Result<Vec<Rsvp>, AppError> {
        Ok(self.tables().promote(event_id, capacity))
    }
}

#[async_trait]
impl ScopeResolver for MemoryStore {
    async fn community_of(&self, scope: Scope) -> Result<Option<i64>, AppError> {
        let t = self.tables();
        Ok(match scope {
            Scope::Community(id) => t.communities.get(&id).map(|c| c.id),
            Scope::Channel(id) => t.channels.get(&id).map(|c| c.community_id),
            Scope::Thread(id) => t
                .messages
                .get(&id)
                .filter(|m| m.is_root())
                .and_then(|m| t.channels.get(&m.channel_id))
                .map(|c| c.community_id),
            Scope::Post(id) => t.posts.get(&id).map(|p| p.community_id),
            Scope::Document(id) => t
                .documents
                .get(&id)
                .filter(|d| !d.is_deleted())
                .map(|d| d.community_id),
            Scope::Event(id) => t.events.get(&id).map(|e| e.community_id),
            Scope::User(_) => None,
        })
    }
}

/// Records every publish as `(channel, event name)`.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    /// Event names published on one broker channel, in order.
    pub fn events_on(&self, channel: &str) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

#[async_trait]
impl RealtimePublisher for RecordingPublisher {
    async fn publish(&self, channel: &str, envelope: &RealtimeEnvelope) -> Result<(), AppError> {
        self.published
            .lock()
            .push((channel.to_string(), envelope.event.name().to_string()));
        Ok(())
    }
}

/// Records every revalidated tag.
#[derive(Default)]
pub struct RecordingRevalidator {
    tags: Mutex<Vec<String>>,
}

impl RecordingRevalidator {
    pub fn tags(&self) -> Vec<String> {
        self.tags.lock().clone()
    }

    pub fn clear(&self) {
        self.tags.lock().clear();
    }
}

#[async_trait]
impl Revalidator for RecordingRevalidator {
    async fn revalidate(&self, tag: &str) -> Result<(), AppError> {
        self.tags.lock().push(tag.to_string());
        Ok(())
    }
}

pub type Communities = CommunityServiceImpl<MemoryStore, MemoryStore>;
pub type Channels = ChannelServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;
pub type Messages = MessageServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;
pub type Forum = ForumServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;
pub type Documents = DocumentServiceImpl<MemoryStore, MemoryStore, MemoryStore>;
pub type Events = EventServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;
pub type Profiles = ProfileServiceImpl<MemoryStore, MemoryStore>;
pub type Realtime = RealtimeServiceImpl<MemoryStore, MemoryStore, MemoryStore>;

/// Services wired over one shared [`MemoryStore`].
pub struct TestHub {
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub revalidator: Arc<RecordingRevalidator>,
    ids: Arc<SnowflakeGenerator>,
    notifier: Notifier,
}

impl Default for TestHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHub {
    pub fn new() -> Self {
        let publisher = Arc::new(RecordingPublisher::default());
        let revalidator = Arc::new(RecordingRevalidator::default());
        let notifier = Notifier::new(publisher.clone(), revalidator.clone());
        Self {
            store: Arc::new(MemoryStore::default()),
            publisher,
            revalidator,
            ids: Arc::new(SnowflakeGenerator::new(7, DEFAULT_EPOCH)),
            notifier,
        }
    }

    /// A fresh id from the shared generator.
    pub fn next_id(&self) -> i64 {
        self.ids.generate()
    }

    pub fn communities(&self) -> Communities {
        CommunityServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.ids.clone(),
            self.notifier.clone(),
        )
    }

    pub fn channels(&self) -> Channels {
        ChannelServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.ids.clone(),
            self.notifier.clone(),
        )
    }

    pub fn messages(&self) -> Messages {
        MessageServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.ids.clone(),
            self.notifier.clone(),
        )
    }

    pub fn forum(&self) -> Forum {
        ForumServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.ids.clone(),
            self.notifier.clone(),
        )
    }

    pub fn documents(&self) -> Documents {
        DocumentServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.ids.clone(),
            self.notifier.clone(),
        )
    }

    pub fn events(&self) -> Events {
        EventServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.ids.clone(),
            self.notifier.clone(),
        )
    }

    pub fn profiles(&self) -> Profiles {
        ProfileServiceImpl::new(self.store.clone(), self.store.clone())
    }

    pub fn realtime(&self) -> Realtime {
        RealtimeServiceImpl::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            TEST_SECRET.to_string(),
            Duration::minutes(5),
        )
    }

    /// Create a community owned by `owner_id` with a generated slug.
    pub async fn community(&self, owner_id: i64, visibility: Visibility) -> CommunityDetail {
        let name: String = Sentence(2..4).fake();
        let request = CreateCommunityDto {
            slug: format!("c-{}", self.next_id()),
            name,
            description: None,
            visibility,
        };
        self.communities()
            .create_community(owner_id, request)
            .await
            .expect("community")
    }

    /// Insert an active membership with the given role directly.
    pub fn add_member(&self, community_id: i64, user_id: i64, role: MemberRole) -> Member {
        let member = Member {
            role,
            ..Member::new(community_id, user_id)
        };
        self.store
            .tables()
            .members
            .insert((community_id, user_id), member.clone());
        member
    }

    /// The `general` channel every community starts with.
    pub fn general_channel(&self, community_id: i64) -> Channel {
        self.store
            .tables()
            .channels
            .values()
            .find(|c| c.community_id == community_id && c.position == 0)
            .cloned()
            .expect("general channel")
    }

    /// Forget everything recorded so far.
    pub fn clear_recordings(&self) {
        self.publisher.clear();
        self.revalidator.clear();
    }
}

/// A random post title.
pub fn title() -> String {
    Sentence(3..6).fake()
}
