//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! Each repository wraps a cloned `PgPool` and maps rows to domain entities
//! through a private row type. Handlers build repositories per request:
//!
//! ```rust,ignore
//! let channel_repo = Arc::new(PgChannelRepository::new(state.db.clone()));
//! let message_repo = Arc::new(PgMessageRepository::new(state.db.clone()));
//! ```

pub mod channel_repository;
pub mod comment_repository;
pub mod community_repository;
pub mod document_repository;
pub mod event_repository;
pub mod member_repository;
pub mod message_repository;
pub mod post_repository;
pub mod read_state_repository;
pub mod scope_resolver;
pub mod user_repository;

pub use channel_repository::PgChannelRepository;
pub use comment_repository::PgCommentRepository;
pub use community_repository::PgCommunityRepository;
pub use document_repository::PgDocumentRepository;
pub use event_repository::PgEventRepository;
pub use member_repository::PgMemberRepository;
pub use message_repository::PgMessageRepository;
pub use post_repository::PgPostRepository;
pub use read_state_repository::PgReadStateRepository;
pub use scope_resolver::PgScopeResolver;
pub use user_repository::PgUserRepository;
