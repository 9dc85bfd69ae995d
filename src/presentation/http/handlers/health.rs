//! Health and Metrics Handlers
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe with dependency checks
//! - `GET /metrics` - Prometheus exposition
//!
//! Postgres is the only hard dependency. The broker and page cache live in
//! Redis and degrade gracefully, so a Redis outage reports `degraded`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::infrastructure::metrics;
use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pin the start time; call once during startup.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness report
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: DependencyHealth,
    pub redis: DependencyHealth,
    pub gateway: GatewayHealth,
}

#[derive(Debug, Serialize)]
pub struct DependencyHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DependencyHealth {
    fn measured(latency_ms: u64, degraded_after_ms: u64) -> Self {
        Self {
            status: if latency_ms < degraded_after_ms {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message),
        }
    }
}

/// Realtime gateway occupancy
#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe: the process is up and serving
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe: 503 when Postgres is unreachable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;
    let status = overall_status(&database, &redis);

    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            database,
            redis,
            gateway: GatewayHealth {
                sessions: state.gateway.session_count(),
            },
        },
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(response))
}

/// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

async fn check_database(state: &AppState) -> DependencyHealth {
    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => DependencyHealth::measured(start.elapsed().as_millis() as u64, 100),
        Err(e) => DependencyHealth::failed(format!("Database connection failed: {}", e)),
    }
}

async fn check_redis(state: &AppState) -> DependencyHealth {
    let start = Instant::now();
    let mut conn = state.redis.clone();
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => DependencyHealth::measured(start.elapsed().as_millis() as u64, 50),
        Err(e) => DependencyHealth::failed(format!("Redis connection failed: {}", e)),
    }
}

fn overall_status(database: &DependencyHealth, redis: &DependencyHealth) -> HealthStatus {
    if database.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }
    if database.status == HealthStatus::Degraded || redis.status != HealthStatus::Healthy {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}
