//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod error;
pub mod response;
pub mod snowflake;
pub mod validation;
