//! HTTP gateway over the model host: `/health`, `/ready`, `/predict`

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pipeline_lib::{
    display_id,
    health::{HealthResponse, ReadinessResponse},
    predictor::ModelHost,
    ModelError, PredictionRequest, PredictionResult, ServingMetrics, StructuredLogger,
    ValidationError,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Route prefix under which model artifacts are served
pub const MODEL_ROUTE_PREFIX: &str = "model";

/// Shared application state
pub struct AppState {
    pub host: Arc<ModelHost>,
    pub model_dir: PathBuf,
    pub service: String,
    pub metrics: ServingMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(host: Arc<ModelHost>, model_dir: PathBuf, service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            host,
            model_dir,
            logger: StructuredLogger::new(service.clone()),
            service,
            metrics: ServingMetrics::new(),
        }
    }
}

/// Failure outcomes of `/predict`
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Model not ready")]
    NotReady,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Cause is logged, never returned to the caller
    #[error("Internal error")]
    Internal(#[source] ModelError),
}

impl GatewayError {
    /// Only a host that is not ready is surfaced as-is; anything else is internal
    pub fn from_inference(err: ModelError) -> Self {
        match err {
            ModelError::NotReady => GatewayError::NotReady,
            other => GatewayError::Internal(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = match &self {
            GatewayError::NotReady => json!({ "error": self.to_string(), "ready": false }),
            _ => json!({ "error": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Liveness - independent of model state
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.service.clone()))
}

/// Readiness - 200 once the model is ready, 503 otherwise
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = ReadinessResponse::for_state(state.host.state(), state.host.model_version());

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Single prediction. The body is taken raw so readiness is checked
/// before anything is parsed.
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let start = Instant::now();

    let worker_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || serve_prediction(&worker_state, &body, start))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "Inference task aborted");
            Err(GatewayError::Internal(ModelError::Execution(e.to_string())))
        });

    match outcome {
        Ok(result) => {
            state.metrics.observe_prediction(start.elapsed().as_secs_f64());
            (StatusCode::CREATED, Json(result)).into_response()
        }
        Err(err) => {
            state.metrics.inc_prediction_rejections(err.status().as_u16());
            err.into_response()
        }
    }
}

fn serve_prediction(
    state: &AppState,
    body: &[u8],
    start: Instant,
) -> Result<PredictionResult, GatewayError> {
    let dim = state.host.input_dim().ok_or(GatewayError::NotReady)?;
    let request = PredictionRequest::parse(body, dim)?;
    let data_id = display_id(&request.meta.data_id);

    let prediction = state.host.infer(&request.features).map_err(|err| {
        let failure = GatewayError::from_inference(err);
        if let GatewayError::Internal(cause) = &failure {
            state.logger.log_prediction_failed(&data_id, &cause.to_string());
        }
        failure
    })?;

    let latency_ms = start.elapsed().as_millis() as u64;
    state.logger.log_prediction(
        &data_id,
        request.meta.source.as_deref(),
        request.meta.correlation_id.as_ref().map(display_id).as_deref(),
        prediction,
        latency_ms,
    );

    Ok(PredictionResult {
        prediction,
        latency_ms,
    })
}

/// Static model artifacts, resolved by the host at load time
async fn model_artifact(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Response {
    if file.is_empty() || file.starts_with('.') || file.contains(|c| c == '/' || c == '\\') {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(state.model_dir.join(&file)).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
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
        .route("/ready", get(ready))
        .route("/predict", post(predict))
        .route(&format!("/{}/:file", MODEL_ROUTE_PREFIX), get(model_artifact))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the listener. Connections are accepted from this point on,
/// before the model finishes loading.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Predict API listening");
    Ok(listener)
}

/// Serve the API on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_host_is_not_an_inference_failure() {
        let failure = GatewayError::from_inference(ModelError::NotReady);

        assert!(matches!(failure, GatewayError::NotReady));
        assert_eq!(failure.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_execution_errors_are_internal() {
        let failure =
            GatewayError::from_inference(ModelError::Execution("backend exploded".into()));

        assert!(matches!(failure, GatewayError::Internal(_)));
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Cause stays out of the response body
        assert_eq!(failure.to_string(), "Internal error");

        let failure = GatewayError::from_inference(ModelError::DimensionMismatch {
            expected: 7,
            received: 6,
        });
        assert!(matches!(failure, GatewayError::Internal(_)));
    }
}
