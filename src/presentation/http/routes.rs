//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;

use super::handlers;
use crate::config::CorsSettings;
use crate::presentation::middleware::{
    auth_middleware, create_cors_layer, create_trace_layer, track_metrics,
};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Realtime gateway; authenticates with a capability token in IDENTIFY
        .route("/gateway", get(ws_handler))
        .route("/health/ready", get(handlers::health::readiness))
        .merge(probe_routes());

    with_http_layers(router, &state.settings.cors).with_state(state)
}

/// Tracing, CORS and request metrics around every route, outermost first.
///
/// CORS must sit inside tracing: its preflight responses need a body type
/// with `Default`, which the trace body lacks.
pub fn with_http_layers<S>(router: Router<S>, cors: &CorsSettings) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(create_trace_layer())
            .layer(create_cors_layer(cors))
            .layer(middleware::from_fn(track_metrics)),
    )
}

/// Routes that need no application state
pub fn probe_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/metrics", get(handlers::health::metrics_handler))
}

/// API v1 routes, all behind bearer authentication
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/me",
            get(handlers::profile::get_me).patch(handlers::profile::update_me),
        )
        .route("/me/communities", get(handlers::profile::get_my_communities))
        .nest("/users", user_routes())
        .nest("/communities", community_routes())
        .nest("/channels", channel_routes())
        .nest("/messages", message_routes())
        .nest("/posts", post_routes())
        .route(
            "/comments/{id}",
            patch(handlers::forum::update_comment).delete(handlers::forum::delete_comment),
        )
        .nest("/documents", document_routes())
        .nest("/events", event_routes())
        .route("/realtime/token", post(handlers::realtime::issue_token))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        // JSON only; the gateway upgrade stays uncompressed
        .layer(CompressionLayer::new())
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/by-username/{username}",
            get(handlers::profile::get_user_by_username),
        )
        .route("/{id}", get(handlers::profile::get_user))
}

fn community_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::community::create_community))
        .route(
            "/by-slug/{slug}",
            get(handlers::community::get_community_by_slug),
        )
        .route(
            "/{id}",
            get(handlers::community::get_community)
                .patch(handlers::community::update_community)
                .delete(handlers::community::delete_community),
        )
        .route("/{id}/join", post(handlers::community::join_community))
        .route("/{id}/leave", post(handlers::community::leave_community))
        .route("/{id}/members", get(handlers::community::list_members))
        .route(
            "/{id}/members/{user_id}",
            delete(handlers::community::remove_member),
        )
        .route(
            "/{id}/members/{user_id}/approve",
            post(handlers::community::approve_member),
        )
        .route(
            "/{id}/members/{user_id}/role",
            put(handlers::community::set_member_role),
        )
        .route(
            "/{id}/members/{user_id}/ban",
            post(handlers::community::ban_member),
        )
        .route(
            "/{id}/channels",
            get(handlers::channel::list_channels).post(handlers::channel::create_channel),
        )
        .route("/{id}/unread", get(handlers::channel::unread_counts))
        .route(
            "/{id}/posts",
            get(handlers::forum::list_posts).post(handlers::forum::create_post),
        )
        .route(
            "/{id}/documents",
            get(handlers::document::list_documents).post(handlers::document::create_document),
        )
        .route(
            "/{id}/events",
            get(handlers::event::list_events).post(handlers::event::create_event),
        )
}

fn channel_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::channel::get_channel)
                .patch(handlers::channel::update_channel)
                .delete(handlers::channel::delete_channel),
        )
        .route("/{id}/archive", put(handlers::channel::archive_channel))
        .route(
            "/{id}/messages",
            get(handlers::message::get_messages).post(handlers::message::send_message),
        )
        .route("/{id}/pins", get(handlers::message::get_channel_pins))
        .route("/{id}/read", post(handlers::message::mark_read))
        .route("/{id}/unread", get(handlers::message::get_unread))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::message::get_message)
                .patch(handlers::message::edit_message)
                .delete(handlers::message::delete_message),
        )
        .route("/{id}/thread", get(handlers::message::get_thread))
        .route("/{id}/thread/pins", get(handlers::message::get_thread_pins))
        .route(
            "/{id}/pin",
            put(handlers::message::pin_message).delete(handlers::message::unpin_message),
        )
}

fn post_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::forum::get_post)
                .patch(handlers::forum::update_post)
                .delete(handlers::forum::delete_post),
        )
        .route("/{id}/vote", put(handlers::forum::vote_post))
        .route("/{id}/lock", put(handlers::forum::lock_post))
        .route("/{id}/pin", put(handlers::forum::pin_post))
        .route(
            "/{id}/comments",
            get(handlers::forum::list_comments).post(handlers::forum::create_comment),
        )
}

fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::document::get_document)
                .patch(handlers::document::update_document)
                .delete(handlers::document::delete_document),
        )
        .route("/{id}/revisions", get(handlers::document::list_revisions))
        .route(
            "/{id}/revisions/{version}",
            get(handlers::document::get_revision),
        )
        .route(
            "/{id}/revisions/{version}/restore",
            post(handlers::document::restore_revision),
        )
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::event::get_event).patch(handlers::event::update_event),
        )
        .route("/{id}/cancel", post(handlers::event::cancel_event))
        .route("/{id}/rsvp", put(handlers::event::rsvp))
        .route("/{id}/rsvps", get(handlers::event::list_rsvps))
}
