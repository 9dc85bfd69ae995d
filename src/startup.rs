//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::Notifier;
use crate::config::Settings;
use crate::infrastructure::cache::{self, RedisPageCache, RedisPublisher};
use crate::infrastructure::database;
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::websocket::{run_broker_bridge, Gateway};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub notifier: Notifier,
    pub page_cache: RedisPageCache,
    pub gateway: Arc<Gateway>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database ready");

        let redis = cache::create_redis_client(&settings.redis).await?;

        let snowflake = Arc::new(SnowflakeGenerator::new(
            u64::from(settings.snowflake.machine_id),
            settings.snowflake.epoch,
        ));

        let page_cache = RedisPageCache::new(redis.clone(), settings.cache.page_ttl_secs);
        let publisher = RedisPublisher::new(redis.clone(), settings.realtime.channel_prefix.as_str());
        let notifier = Notifier::new(Arc::new(publisher), Arc::new(page_cache.clone()));

        let gateway = Arc::new(Gateway::new(settings.websocket.heartbeat_interval_ms));

        // The bridge needs a dedicated connection; pub/sub cannot share the manager.
        let broker = redis::Client::open(settings.redis.url.as_str())?;
        tokio::spawn(run_broker_bridge(
            broker,
            settings.realtime.channel_prefix.clone(),
            gateway.clone(),
        ));

        let addr = settings.server.socket_addr()?;

        let state = AppState {
            db,
            redis,
            snowflake,
            notifier,
            page_cache,
            gateway,
            settings: Arc::new(settings),
        };

        let router = routes::create_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Listening");

        Ok(Self { listener, router })
    }

    /// Run the server until Ctrl-C
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
