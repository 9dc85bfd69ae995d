//! Authentication Middleware
//!
//! Bearer token validation for protected routes. Access tokens are issued by
//! the identity provider and signed with the shared JWT secret.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    RequestExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Authenticated user extension
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
}

/// Decode an access token into the authenticated user.
///
/// Tokens carrying an audience (realtime capability tokens) are rejected.
pub fn authenticate(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".into())
        }
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    let user_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token claims".into()))?;

    Ok(AuthUser { user_id })
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = request
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AppError::Unauthorized("Missing authorization header".into()))?;

    let user = authenticate(bearer.token(), &state.settings.jwt.secret)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
