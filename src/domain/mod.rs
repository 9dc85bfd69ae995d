//! # Domain Layer
//!
//! The domain layer contains the core business logic of the community
//! platform. It is independent of any external frameworks or infrastructure
//! concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Community, Channel, Message, etc.)
//! - **events**: Realtime event payloads and broker channel names
//! - **services**: Domain services for complex business logic
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Pure business logic and domain rules
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod events;
pub mod services;

// Re-export commonly used types
pub use entities::*;
pub use events::{RealtimeEnvelope, RealtimeEvent, Scope};
