//! HTTP surface of the orchestrator: `/health`, `/run`, `/metrics`

use crate::config::OrchestratorConfig;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pipeline_lib::{
    display_id,
    health::{services, HealthResponse},
    saga::{HttpFeatureSource, HttpInferenceClient, Saga},
    ServingMetrics, StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Inbound header forwarded to the predict hop as `meta.correlationId`
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Body returned for every failed run
pub const RUN_FAILED_MESSAGE: &str = "Pipeline run failed";

/// Shared application state
pub struct AppState {
    pub saga: Saga,
    pub metrics: ServingMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(saga: Saga) -> Self {
        Self {
            saga,
            metrics: ServingMetrics::new(),
            logger: StructuredLogger::new(services::ORCHESTRATOR),
        }
    }

    /// Wire the saga to the HTTP acquire and predict services
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let source = HttpFeatureSource::new(client.clone(), &config.acquire_url)?;
        let inference = HttpInferenceClient::new(client, &config.predict_url)?;
        info!(
            acquire = %source.url(),
            predict = %inference.url(),
            hop_timeout_ms = config.hop_timeout_ms,
            "Saga endpoints configured"
        );

        Ok(Self::new(Saga::new(
            Arc::new(source),
            Arc::new(inference),
            config.saga_config(),
        )))
    }
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(services::ORCHESTRATOR))
}

/// One saga run. Every hop failure collapses into the same 502; the
/// cause goes to the log only.
async fn run(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match state.saga.run(correlation_id).await {
        Ok(result) => {
            let elapsed = start.elapsed();
            state.metrics.observe_saga_success(elapsed.as_secs_f64());
            state.logger.log_saga_completed(
                &display_id(&result.data_id),
                result.prediction,
                elapsed.as_millis() as u64,
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => {
            let elapsed = start.elapsed();
            state
                .metrics
                .observe_saga_failure(err.hop.as_str(), elapsed.as_secs_f64());
            state
                .logger
                .log_saga_failed(err.hop.as_str(), &err.to_string(), elapsed.as_millis() as u64);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": RUN_FAILED_MESSAGE })),
            )
                .into_response()
        }
    }
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(run))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Orchestrator API listening");
    Ok(listener)
}

/// Serve until `shutdown` resolves; in-flight runs are allowed to finish
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
