//! Profile Service
//!
//! Public profiles and the communities a user belongs to.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Community, CommunityRepository, ProfilePatch, User, UserRepository};
use crate::shared::error::AppError;

/// Profile service trait
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// The caller's own profile, created on first sight of the identity
    async fn ensure_profile(&self, user_id: i64) -> Result<User, ProfileError>;

    /// Get profile by user ID
    async fn get_profile(&self, user_id: i64) -> Result<User, ProfileError>;

    /// Get profile by username
    async fn get_profile_by_username(&self, username: &str) -> Result<User, ProfileError>;

    /// Update a profile. Users may only edit their own.
    async fn update_profile(
        &self,
        actor_id: i64,
        user_id: i64,
        patch: ProfilePatch,
    ) -> Result<User, ProfileError>;

    /// Communities the user is an active member of
    async fn list_communities(&self, user_id: i64) -> Result<Vec<Community>, ProfileError>;
}

/// Profile service errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("User not found")]
    NotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Usernames of the form user_<number> are reserved")]
    UsernameReserved,

    #[error("You can only edit your own profile")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::NotFound => AppError::NotFound(e.to_string()),
            ProfileError::UsernameTaken => AppError::Conflict(e.to_string()),
            ProfileError::UsernameReserved => AppError::Validation(e.to_string()),
            ProfileError::Forbidden => AppError::Forbidden(e.to_string()),
            ProfileError::Repository(inner) => inner,
        }
    }
}

/// ProfileService implementation
pub struct ProfileServiceImpl<U, C>
where
    U: UserRepository,
    C: CommunityRepository,
{
    user_repo: Arc<U>,
    community_repo: Arc<C>,
}

impl<U, C> ProfileServiceImpl<U, C>
where
    U: UserRepository,
    C: CommunityRepository,
{
    pub fn new(user_repo: Arc<U>, community_repo: Arc<C>) -> Self {
        Self {
            user_repo,
            community_repo,
        }
    }
}

#[async_trait]
impl<U, C> ProfileService for ProfileServiceImpl<U, C>
where
    U: UserRepository + 'static,
    C: CommunityRepository + 'static,
{
    async fn ensure_profile(&self, user_id: i64) -> Result<User, ProfileError> {
        if let Some(user) = self.user_repo.find_by_id(user_id).await? {
            return Ok(user);
        }
        let user = self
            .user_repo
            .create_if_missing(&User::placeholder(user_id))
            .await?;
        tracing::info!(user_id, username = %user.username, "Profile provisioned");
        Ok(user)
    }

    async fn get_profile(&self, user_id: i64) -> Result<User, ProfileError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<User, ProfileError> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    async fn update_profile(
        &self,
        actor_id: i64,
        user_id: i64,
        mut patch: ProfilePatch,
    ) -> Result<User, ProfileError> {
        if actor_id != user_id {
            return Err(ProfileError::Forbidden);
        }

        let mut user = self.get_profile(user_id).await?;

        if let Some(username) = patch.username.take() {
            let username = username.trim().to_lowercase();
            if username != user.username {
                if User::is_reserved_for_other(&username, user.id) {
                    return Err(ProfileError::UsernameReserved);
                }
                if let Some(existing) = self.user_repo.find_by_username(&username).await? {
                    if existing.id != user.id {
                        return Err(ProfileError::UsernameTaken);
                    }
                }
            }
            patch.username = Some(username);
        }

        patch.apply(&mut user);
        let updated = self.user_repo.update(&user).await?;

        tracing::info!(user_id = updated.id, "Profile updated");
        Ok(updated)
    }

    async fn list_communities(&self, user_id: i64) -> Result<Vec<Community>, ProfileError> {
        Ok(self.community_repo.find_by_member(user_id).await?)
    }
}
