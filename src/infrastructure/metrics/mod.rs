//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, route, and status
//! - HTTP request latency histograms
//! - Realtime publishes by outcome
//! - Page cache revalidations by outcome
//! - Active gateway connection gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "community_hub";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, route, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Realtime broker publishes by outcome ("ok", "error")
pub static REALTIME_PUBLISH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("realtime_publish_total", "Realtime events published to the broker")
            .namespace(NAMESPACE),
        &["event", "outcome"],
    )
    .expect("Failed to create REALTIME_PUBLISH_TOTAL metric")
});

/// Page cache tag revalidations by outcome
pub static CACHE_REVALIDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cache_revalidations_total", "Page cache tag revalidations")
            .namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create CACHE_REVALIDATIONS_TOTAL metric")
});

/// Active gateway connections
pub static GATEWAY_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "gateway_connections_active",
            "Number of active realtime gateway connections",
        )
        .namespace(NAMESPACE),
        &["state"], // "connected", "identified"
    )
    .expect("Failed to create GATEWAY_CONNECTIONS_ACTIVE metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(REALTIME_PUBLISH_TOTAL.clone()))
        .expect("Failed to register REALTIME_PUBLISH_TOTAL");
    registry
        .register(Box::new(CACHE_REVALIDATIONS_TOTAL.clone()))
        .expect("Failed to register CACHE_REVALIDATIONS_TOTAL");
    registry
        .register(Box::new(GATEWAY_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register GATEWAY_CONNECTIONS_ACTIVE");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to record one broker publish
pub fn record_publish(event: &str, ok: bool) {
    REALTIME_PUBLISH_TOTAL
        .with_label_values(&[event, if ok { "ok" } else { "error" }])
        .inc();
}

/// Helper to record one cache revalidation
pub fn record_revalidation(ok: bool) {
    CACHE_REVALIDATIONS_TOTAL
        .with_label_values(&[if ok { "ok" } else { "error" }])
        .inc();
}

/// Helper to update gateway connection counts
pub fn set_gateway_connections(connected: usize, identified: usize) {
    GATEWAY_CONNECTIONS_ACTIVE
        .with_label_values(&["connected"])
        .set(connected as f64);
    GATEWAY_CONNECTIONS_ACTIVE
        .with_label_values(&["identified"])
        .set(identified as f64);
}
