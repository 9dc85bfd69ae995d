//! Health Check API Tests
//!
//! Probe endpoints that answer without database or Redis.

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde_json::Value;

use community_hub::config::CorsSettings;
use community_hub::infrastructure::metrics;
use community_hub::presentation::http::routes::{probe_routes, with_http_layers};

fn server() -> TestServer {
    let app: Router = Router::new().merge(probe_routes());
    TestServer::new(app).unwrap()
}

/// Test basic health check endpoint returns 200 OK with a status field
#[tokio::test]
async fn test_health_check_returns_ok() {
    let response = server().get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

/// Liveness never depends on backing services
#[tokio::test]
async fn test_liveness_probe() {
    let response = server().get("/health/live").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "alive");
}

#[tokio::test]
async fn test_metrics_exposition() {
    metrics::record_publish("message.created", true);

    let response = server().get("/metrics").await;

    response.assert_status_ok();
    let content_type = response.header("content-type");
    assert_eq!(content_type.to_str().unwrap(), "text/plain; version=0.0.4");
    assert!(response
        .text()
        .contains("community_hub_realtime_publish_total"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = server().get("/nowhere").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_layered_router_answers_preflight() {
    let cors = CorsSettings {
        allowed_origins: vec!["https://hub.example.com".into()],
    };
    let app: Router = with_http_layers(Router::new().merge(probe_routes()), &cors);
    let server = TestServer::new(app).unwrap();

    let response = server
        .method(Method::OPTIONS, "/health")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("https://hub.example.com"),
        )
        .add_header(
            HeaderName::from_static("access-control-request-method"),
            HeaderValue::from_static("GET"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        response
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .to_str()
            .unwrap(),
        "https://hub.example.com"
    );

    // Regular requests still pass through every layer.
    server.get("/health").await.assert_status_ok();
}
