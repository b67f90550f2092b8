//! Predict - energy-demand inference service
//!
//! Starts accepting connections immediately, then loads and warms up the
//! model in the background. Until the load completes `/ready` and
//! `/predict` answer 503; a failed load keeps them that way.

use anyhow::Result;
use pipeline_lib::predictor::{ModelHost, OnnxLoader};
use predict_service::{api, config::PredictConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting predict service");

    let config = PredictConfig::load()?;
    let location = config.artifact_location()?;
    let mut loader = OnnxLoader::new()?;
    if let Some(checksum) = &config.model_sha256 {
        loader = loader.with_checksum(checksum.clone());
    }

    let host = Arc::new(ModelHost::new(config.model_version.clone()));
    let state = Arc::new(api::AppState::new(
        host.clone(),
        config.model_dir.clone(),
        config.service_name.clone(),
    ));

    let metrics = state.metrics.clone();
    let logger = state.logger.clone();
    metrics.set_model_version(host.model_version());
    metrics.set_model_state(host.state());

    let listener = api::bind(config.port).await?;
    logger.log_startup(SERVICE_VERSION, config.port);
    let api_handle = tokio::spawn(api::serve(listener, state));

    // The artifact may be served by this process, so load only once the
    // listener is up. No retry: a failed load needs a restart.
    let load_logger = logger.clone();
    tokio::spawn(async move {
        match host.load(&loader, &location).await {
            Ok(()) => load_logger.log_model_loaded(
                host.model_version(),
                host.input_dim().unwrap_or_default(),
            ),
            Err(err) => load_logger.log_model_load_failed(host.model_version(), &err.to_string()),
        }
        metrics.set_model_state(host.state());
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            served??;
            logger.log_shutdown("API server exited");
        }
    }

    info!("Shutting down");
    Ok(())
}
