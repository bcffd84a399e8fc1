use anyhow::Result;
use tracing::info;

use service::{app::Application, config::Config, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    telemetry::init_logging(&config.logging);

    info!("Starting Template Service v{}", env!("CARGO_PKG_VERSION"));

    let app = Application::build(&config).await?;
    info!("Template service running; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    app.shutdown();

    Ok(())
}
