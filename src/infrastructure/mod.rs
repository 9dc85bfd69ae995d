//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Realtime publishing and page caching (Redis)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
