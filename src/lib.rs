//! # Community Hub Library
//!
//! Backend for community spaces: chat channels with threads and read state,
//! a voted forum, versioned documents and events with RSVPs.
//!
//! - RESTful HTTP API endpoints
//! - Redis broker fan-out and a websocket gateway for realtime clients
//! - PostgreSQL for persistent storage
//! - Redis tag sets for page cache revalidation
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities and repository traits
//! - **Application Layer**: Business logic services and DTOs
//! - **Infrastructure Layer**: Database, cache, and external service implementations
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! community_hub/
//! +-- config/        Configuration management
//! +-- domain/        Domain entities, value objects, and traits
//! +-- application/   Application services and DTOs
//! +-- infrastructure/ Database and cache implementations
//! +-- presentation/  HTTP routes and WebSocket handlers
//! +-- shared/        Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
