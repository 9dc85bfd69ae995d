//! Application settings and configuration structures.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::shared::snowflake::DEFAULT_EPOCH;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// Bearer token verification and realtime token signing
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Realtime broker settings
    pub realtime: RealtimeSettings,

    /// Page cache settings
    pub cache: CacheSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket gateway configuration
    pub websocket: WebSocketSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT configuration.
///
/// Access tokens are issued by the identity provider and signed with the
/// shared secret; the same secret signs realtime capability tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared HMAC secret
    pub secret: String,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-1023)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// Realtime broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    /// Prefix prepended to every broker channel (e.g., "rt:")
    pub channel_prefix: String,

    /// Capability token lifetime in seconds
    pub token_ttl_secs: i64,
}

/// Page cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Lifetime of a cached page in seconds
    pub page_ttl_secs: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds (default: 45000)
    pub heartbeat_interval_ms: u64,

    /// Connection timeout for identify in seconds (default: 30)
    pub identify_timeout_secs: u64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. Built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. `APP__` prefixed environment variables
    /// 5. Well-known plain variables (`DATABASE_URL`, `REDIS_URL`, ...)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        let builder = Self::defaults(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?;

        Self::from_builder(builder)
    }

    /// Built-in defaults for every optional setting.
    pub fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", DEFAULT_EPOCH)?
            .set_default("realtime.channel_prefix", "rt:")?
            .set_default("realtime.token_ttl_secs", 300)?
            .set_default("cache.page_ttl_secs", 60)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // WebSocket settings - security limits to prevent DoS
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.heartbeat_interval_ms", 45000_i64)?
            .set_default("websocket.identify_timeout_secs", 30_i64)
    }

    /// Build, deserialize and validate.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.snowflake.machine_id > 1023 {
            return Err(ConfigError::Message(format!(
                "Snowflake machine id must be in 0..=1023, got {}",
                self.snowflake.machine_id
            )));
        }
        if self.realtime.token_ttl_secs <= 0 {
            return Err(ConfigError::Message(
                "Realtime token TTL must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
