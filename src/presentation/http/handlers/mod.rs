//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod channel;
pub mod community;
pub mod document;
pub mod event;
pub mod forum;
pub mod health;
pub mod message;
pub mod profile;
pub mod realtime;
