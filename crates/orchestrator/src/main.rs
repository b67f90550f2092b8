//! Orchestrator - runs acquire -> predict for every `POST /run`

use anyhow::Result;
use orchestrator::{api, config::OrchestratorConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting orchestrator");

    let config = OrchestratorConfig::load()?;
    let state = Arc::new(api::AppState::from_config(&config)?);
    let logger = state.logger.clone();

    let listener = api::bind(config.port).await?;
    logger.log_startup(SERVICE_VERSION, config.port);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    api::serve(listener, state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    Ok(())
}
