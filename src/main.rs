//! # Community Hub
//!
//! Entry point: tracing, configuration, then the HTTP and gateway server.

use anyhow::Result;
use tracing::info;

use community_hub::config::Settings;
use community_hub::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    community_hub::telemetry::init_tracing();

    info!("Starting Community Hub...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
