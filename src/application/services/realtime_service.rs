//! Realtime Service
//!
//! Issues short-lived capability tokens for the broker and decides which
//! broker channels a token holder may subscribe to.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::events::{channels, Scope};
use crate::domain::{ChannelRepository, MemberRepository};
use crate::shared::error::AppError;

/// Audience claim separating capability tokens from access tokens.
pub const REALTIME_AUDIENCE: &str = "realtime";

/// Realtime service trait
#[async_trait]
pub trait RealtimeService: Send + Sync {
    /// Sign a capability token for the user's current memberships
    async fn issue_token(&self, user_id: i64) -> Result<RealtimeToken, RealtimeError>;

    /// Verify signature, audience and expiry
    fn verify_token(&self, token: &str) -> Result<RealtimeClaims, RealtimeError>;

    /// Check a subscription request against the token's capabilities
    async fn authorize(&self, claims: &RealtimeClaims, channel: &str) -> Result<Scope, RealtimeError>;
}

/// Resolves the community a scoped resource belongs to.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// `None` when the resource does not exist. User scopes have no community.
    async fn community_of(&self, scope: Scope) -> Result<Option<i64>, AppError>;
}

/// Capability token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeClaims {
    pub sub: String,
    pub aud: String,
    /// Active communities at issue time
    pub communities: Vec<i64>,
    /// Broker channels granted explicitly
    pub channels: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl RealtimeClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Issued token
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub channels: Vec<String>,
}

/// Realtime service errors
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Invalid realtime token")]
    InvalidToken,

    #[error("Realtime token expired")]
    TokenExpired,

    #[error("Unknown channel name")]
    InvalidChannel,

    #[error("Not allowed to subscribe to this channel")]
    Forbidden,

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<RealtimeError> for AppError {
    fn from(e: RealtimeError) -> Self {
        match e {
            RealtimeError::InvalidToken | RealtimeError::TokenExpired => {
                AppError::Unauthorized(e.to_string())
            }
            RealtimeError::InvalidChannel => AppError::BadRequest(e.to_string()),
            RealtimeError::Forbidden => AppError::Forbidden(e.to_string()),
            RealtimeError::Signing(msg) => AppError::Internal(msg),
            RealtimeError::Repository(inner) => inner,
        }
    }
}

/// RealtimeService implementation
pub struct RealtimeServiceImpl<M, Ch, S>
where
    M: MemberRepository,
    Ch: ChannelRepository,
    S: ScopeResolver,
{
    member_repo: Arc<M>,
    channel_repo: Arc<Ch>,
    resolver: Arc<S>,
    secret: String,
    ttl: Duration,
}

impl<M, Ch, S> RealtimeServiceImpl<M, Ch, S>
where
    M: MemberRepository,
    Ch: ChannelRepository,
    S: ScopeResolver,
{
    pub fn new(
        member_repo: Arc<M>,
        channel_repo: Arc<Ch>,
        resolver: Arc<S>,
        secret: String,
        ttl: Duration,
    ) -> Self {
        Self {
            member_repo,
            channel_repo,
            resolver,
            secret,
            ttl,
        }
    }

    async fn community_allowed(&self, claims: &RealtimeClaims, scope: Scope) -> Result<bool, RealtimeError> {
        let community = self.resolver.community_of(scope).await?;
        Ok(community.is_some_and(|id| claims.communities.contains(&id)))
    }
}

#[async_trait]
impl<M, Ch, S> RealtimeService for RealtimeServiceImpl<M, Ch, S>
where
    M: MemberRepository + 'static,
    Ch: ChannelRepository + 'static,
    S: ScopeResolver + 'static,
{
    async fn issue_token(&self, user_id: i64) -> Result<RealtimeToken, RealtimeError> {
        let memberships = self.member_repo.find_by_user(user_id).await?;
        let communities: Vec<i64> = memberships
            .iter()
            .filter(|m| m.is_active())
            .map(|m| m.community_id)
            .collect();

        let mut granted = vec![channels::user(user_id)];
        for community_id in &communities {
            granted.push(channels::community(*community_id));
            for channel in self.channel_repo.find_by_community(*community_id).await? {
                granted.push(channels::channel(channel.id));
            }
        }

        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = RealtimeClaims {
            sub: user_id.to_string(),
            aud: REALTIME_AUDIENCE.to_string(),
            communities,
            channels: granted.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| RealtimeError::Signing(e.to_string()))?;

        tracing::debug!(user_id, channels = granted.len(), "Realtime token issued");
        Ok(RealtimeToken {
            token,
            expires_at,
            channels: granted,
        })
    }

    fn verify_token(&self, token: &str) -> Result<RealtimeClaims, RealtimeError> {
        let mut validation = Validation::default();
        validation.set_audience(&[REALTIME_AUDIENCE]);

        let data = decode::<RealtimeClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => RealtimeError::TokenExpired,
            _ => RealtimeError::InvalidToken,
        })?;

        if data.claims.user_id().is_none() {
            return Err(RealtimeError::InvalidToken);
        }
        Ok(data.claims)
    }

    async fn authorize(&self, claims: &RealtimeClaims, channel: &str) -> Result<Scope, RealtimeError> {
        let scope = Scope::parse(channel).ok_or(RealtimeError::InvalidChannel)?;

        let allowed = match scope {
            Scope::User(id) => claims.user_id() == Some(id),
            Scope::Community(id) => claims.communities.contains(&id),
            Scope::Channel(_) if claims.channels.iter().any(|c| c == channel) => true,
            Scope::Channel(_)
            | Scope::Thread(_)
            | Scope::Post(_)
            | Scope::Document(_)
            | Scope::Event(_) => self.community_allowed(claims, scope).await?,
        };

        if !allowed {
            return Err(RealtimeError::Forbidden);
        }
        Ok(scope)
    }
}
