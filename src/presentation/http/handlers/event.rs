//! Event Handlers

use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
};

use crate::application::dto::request::{
    CreateEventRequest, EventQueryParams, RsvpRequest, UpdateEventRequest,
};
use crate::application::services::{EventService, EventView, RsvpOutcome};
use crate::domain::Rsvp;
use crate::presentation::http::extractors::IdPath;
use crate::presentation::http::services::event_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::{created, ApiResponse};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Schedule an event
pub async fn create_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, ApiResponse<EventView>), AppError> {
    validate(&body)?;

    let event = event_service(&state)
        .create_event(community_id, auth.user_id, body.into())
        .await?;

    Ok(created(event))
}

/// List a community's events
pub async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Query(params): Query<EventQueryParams>,
) -> Result<ApiResponse<Vec<EventView>>, AppError> {
    let events = event_service(&state)
        .list_events(community_id, auth.user_id, params.upcoming)
        .await?;
    Ok(ApiResponse::ok(events))
}

/// Get an event with its tally and the caller's RSVP
pub async fn get_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(event_id): IdPath,
) -> Result<ApiResponse<EventView>, AppError> {
    let event = event_service(&state).get_event(event_id, auth.user_id).await?;
    Ok(ApiResponse::ok(event))
}

/// Update an event
pub async fn update_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(event_id): IdPath,
    Json(body): Json<UpdateEventRequest>,
) -> Result<ApiResponse<EventView>, AppError> {
    validate(&body)?;

    let event = event_service(&state)
        .update_event(event_id, auth.user_id, body.into())
        .await?;

    Ok(ApiResponse::ok(event))
}

/// Cancel an event
pub async fn cancel_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(event_id): IdPath,
) -> Result<ApiResponse<EventView>, AppError> {
    let event = event_service(&state)
        .cancel_event(event_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(event))
}

/// Set the caller's RSVP
pub async fn rsvp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(event_id): IdPath,
    Json(body): Json<RsvpRequest>,
) -> Result<ApiResponse<RsvpOutcome>, AppError> {
    let outcome = event_service(&state)
        .rsvp(event_id, auth.user_id, body.status)
        .await?;
    Ok(ApiResponse::ok(outcome))
}

/// Every RSVP of an event
pub async fn list_rsvps(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(event_id): IdPath,
) -> Result<ApiResponse<Vec<Rsvp>>, AppError> {
    let rsvps = event_service(&state)
        .list_rsvps(event_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(rsvps))
}
