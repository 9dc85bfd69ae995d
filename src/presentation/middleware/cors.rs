//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::PUT,
    Method::DELETE,
];

/// Create CORS layer from settings.
///
/// `*` or an empty list allows any origin.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(origins)
            .max_age(Duration::from_secs(3600))
    }
}
