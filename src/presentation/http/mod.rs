//! HTTP API
//!
//! Routes, handlers, and the per-request service wiring.

pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod services;
