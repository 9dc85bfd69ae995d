//! Custom Extractors
//!
//! Snowflake ids travel as strings in paths and bodies.

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::shared::error::AppError;

/// Parse a snowflake id from its string form.
pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid ID: {}", raw)))
}

/// Parse an optional id, e.g. a `before` cursor.
pub fn parse_optional_id(raw: Option<&str>) -> Result<Option<i64>, AppError> {
    raw.map(parse_id).transpose()
}

/// The single `{id}` segment of a route, parsed.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub i64);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::BadRequest("Missing ID in path".into()))?;
        parse_id(&raw).map(IdPath)
    }
}

/// Two `{id}` segments, e.g. `/communities/{id}/members/{user_id}`.
#[derive(Debug, Clone, Copy)]
pub struct IdPairPath(pub i64, pub i64);

impl<S> FromRequestParts<S> for IdPairPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((first, second)) = Path::<(String, String)>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::BadRequest("Missing ID in path".into()))?;
        Ok(IdPairPath(parse_id(&first)?, parse_id(&second)?))
    }
}
