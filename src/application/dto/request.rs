//! Request DTOs
//!
//! Data structures for API request bodies and query strings. Ids travel as
//! strings and are parsed in the handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::application::services::{
    CreateChannelDto, CreateCommunityDto, CreateDocumentDto, CreateEventDto, CreatePostDto,
    UpdateChannelDto, UpdateCommunityDto, UpdateDocumentDto, UpdateEventDto, UpdatePostDto,
};
use crate::domain::{
    EditPolicy, MemberRole, PinScope, ProfilePatch, RsvpStatus, Visibility, VoteValue,
};
use crate::shared::validation::{validate_not_blank, validate_slug, validate_username};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// Profiles

/// Update profile request. Empty strings clear optional fields.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,

    #[validate(length(max = 64, message = "Display name must be at most 64 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,

    #[validate(length(max = 2048, message = "Avatar URL is too long"))]
    pub avatar_url: Option<String>,

    #[validate(length(max = 2048, message = "Website is too long"))]
    pub website: Option<String>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            username: req.username,
            display_name: req.display_name,
            bio: req.bio,
            avatar_url: req.avatar_url,
            website: req.website,
        }
    }
}

// Communities

/// Create community request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommunityRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_slug"))]
    pub slug: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub visibility: Visibility,
}

impl From<CreateCommunityRequest> for CreateCommunityDto {
    fn from(req: CreateCommunityRequest) -> Self {
        Self {
            name: req.name,
            slug: req.slug,
            description: req.description,
            visibility: req.visibility,
        }
    }
}

/// Update community request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommunityRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub visibility: Option<Visibility>,
}

impl From<UpdateCommunityRequest> for UpdateCommunityDto {
    fn from(req: UpdateCommunityRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            visibility: req.visibility,
        }
    }
}

/// Change a member's role
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: MemberRole,
}

/// Member list query parameters
#[derive(Debug, Deserialize)]
pub struct MembersQueryParams {
    pub status: Option<String>,
    pub after: Option<String>,
    pub limit: Option<i32>,
}

// Channels

/// Create channel request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChannelRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(length(max = 1024, message = "Topic must be at most 1024 characters"))]
    pub topic: Option<String>,
}

impl From<CreateChannelRequest> for CreateChannelDto {
    fn from(req: CreateChannelRequest) -> Self {
        Self {
            name: req.name,
            topic: req.topic,
        }
    }
}

/// Update channel request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateChannelRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,

    #[validate(length(max = 1024, message = "Topic must be at most 1024 characters"))]
    pub topic: Option<String>,

    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,
}

impl From<UpdateChannelRequest> for UpdateChannelDto {
    fn from(req: UpdateChannelRequest) -> Self {
        Self {
            name: req.name,
            topic: req.topic,
            position: req.position,
        }
    }
}

/// Archive or unarchive a channel
#[derive(Debug, Deserialize)]
pub struct ArchiveChannelRequest {
    #[serde(default = "default_true")]
    pub archived: bool,
}

fn default_true() -> bool {
    true
}

// Messages

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Content must be 1-4000 characters"))]
    pub content: String,

    pub reply_to: Option<String>,
}

/// Edit message request
#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Content must be 1-4000 characters"))]
    pub content: String,
}

/// Message query parameters
#[derive(Debug, Deserialize)]
pub struct MessageQueryParams {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: Option<i32>,
}

/// Pin scope query parameter (`?scope=thread`)
#[derive(Debug, Deserialize)]
pub struct PinQueryParams {
    #[serde(default)]
    pub scope: PinScope,
}

/// Mark a channel read up to `at` (default now)
#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
    pub at: Option<DateTime<Utc>>,
}

// Forum

/// Create post request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(
        length(min = 3, max = 300, message = "Title must be 3-300 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 40000, message = "Body must be at most 40000 characters"))]
    pub body: String,
}

impl From<CreatePostRequest> for CreatePostDto {
    fn from(req: CreatePostRequest) -> Self {
        Self {
            title: req.title,
            body: req.body,
        }
    }
}

/// Update post request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(
        length(min = 3, max = 300, message = "Title must be 3-300 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,

    #[validate(length(max = 40000, message = "Body must be at most 40000 characters"))]
    pub body: Option<String>,
}

impl From<UpdatePostRequest> for UpdatePostDto {
    fn from(req: UpdatePostRequest) -> Self {
        Self {
            title: req.title,
            body: req.body,
        }
    }
}

/// Post listing query parameters
#[derive(Debug, Deserialize)]
pub struct PostQueryParams {
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i32>,
}

/// Vote request; `none` clears the vote
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: VoteValue,
}

/// Lock or unlock a post
#[derive(Debug, Deserialize)]
pub struct LockPostRequest {
    pub locked: bool,
}

/// Pin or unpin a post
#[derive(Debug, Deserialize)]
pub struct PinPostRequest {
    pub pinned: bool,
}

/// Create comment request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 10000, message = "Comment must be 1-10000 characters"))]
    pub body: String,

    pub parent_id: Option<String>,
}

/// Edit comment request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 10000, message = "Comment must be 1-10000 characters"))]
    pub body: String,
}

// Documents

/// Create document request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 200000, message = "Document is too long"))]
    pub content: String,

    #[serde(default)]
    pub edit_policy: EditPolicy,
}

impl From<CreateDocumentRequest> for CreateDocumentDto {
    fn from(req: CreateDocumentRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            edit_policy: req.edit_policy,
        }
    }
}

/// Update document request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,

    #[validate(length(max = 200000, message = "Document is too long"))]
    pub content: Option<String>,

    pub edit_policy: Option<EditPolicy>,

    #[validate(range(min = 1, message = "expected_version must be positive"))]
    pub expected_version: i32,
}

impl From<UpdateDocumentRequest> for UpdateDocumentDto {
    fn from(req: UpdateDocumentRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            edit_policy: req.edit_policy,
            expected_version: req.expected_version,
        }
    }
}

// Events

/// Create event request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(
        length(min = 3, max = 200, message = "Title must be 3-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 300, message = "Location must be at most 300 characters"))]
    pub location: Option<String>,

    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 100000, message = "Capacity must be 1-100000"))]
    pub capacity: Option<i32>,
}

impl From<CreateEventRequest> for CreateEventDto {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            location: req.location,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            capacity: req.capacity,
        }
    }
}

/// Update event request. `null` clears optional fields.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(
        length(min = 3, max = 200, message = "Title must be 3-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,

    pub starts_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "double_option")]
    pub ends_at: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    pub capacity: Option<Option<i32>>,
}

impl From<UpdateEventRequest> for UpdateEventDto {
    fn from(req: UpdateEventRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            location: req.location,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            capacity: req.capacity,
        }
    }
}

/// Event listing query parameters
#[derive(Debug, Deserialize)]
pub struct EventQueryParams {
    #[serde(default)]
    pub upcoming: bool,
}

/// RSVP request
#[derive(Debug, Deserialize)]
pub struct RsvpRequest {
    pub status: RsvpStatus,
}
