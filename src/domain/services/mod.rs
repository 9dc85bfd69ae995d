//! # Domain Services
//!
//! Domain services encapsulate business logic that doesn't naturally
//! belong to a single entity.
//!
//! ## Services
//!
//! - **PermissionService**: Role and status based authorization
//! - **threading**: Reply placement and thread depth rules
//! - **MessageWindow**: Client-side message list kept in sync with realtime events

mod message_window;
mod permission_service;
mod threading;

pub use message_window::{MessageWindow, PageCursor, WindowScope};
pub use permission_service::*;
pub use threading::{place_reply, ThreadError, ThreadPlacement};
