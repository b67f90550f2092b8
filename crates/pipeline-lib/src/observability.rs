//! Observability infrastructure for the pipeline services
//!
//! Provides:
//! - Prometheus metrics (inference latency, prediction outcomes, model state, saga runs)
//! - Structured JSON logging with tracing

use crate::predictor::ModelState;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServingMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServingMetricsInner {
    inference_latency_seconds: Histogram,
    predictions_served: IntCounter,
    prediction_rejections: IntCounterVec,
    model_state: IntGauge,
    model_version_info: GaugeVec,
    saga_runs: IntCounterVec,
    saga_hop_failures: IntCounterVec,
    saga_duration_seconds: Histogram,
}

impl ServingMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram!(
                "pipeline_inference_latency_seconds",
                "Time spent serving /predict, validation through cleanup",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            predictions_served: register_int_counter!(
                "pipeline_predictions_served_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_served"),

            prediction_rejections: register_int_counter_vec!(
                "pipeline_prediction_rejections_total",
                "Predictions not served, by response status",
                &["status"]
            )
            .expect("Failed to register prediction_rejections"),

            model_state: register_int_gauge!(
                "pipeline_model_state",
                "Model lifecycle state (0 loading, 1 ready, 2 failed)"
            )
            .expect("Failed to register model_state"),

            model_version_info: register_gauge_vec!(
                "pipeline_model_version_info",
                "Information about the configured model",
                &["version"]
            )
            .expect("Failed to register model_version_info"),

            saga_runs: register_int_counter_vec!(
                "pipeline_saga_runs_total",
                "Saga runs by outcome",
                &["outcome"]
            )
            .expect("Failed to register saga_runs"),

            saga_hop_failures: register_int_counter_vec!(
                "pipeline_saga_hop_failures_total",
                "Saga failures by failing hop",
                &["hop"]
            )
            .expect("Failed to register saga_hop_failures"),

            saga_duration_seconds: register_histogram!(
                "pipeline_saga_duration_seconds",
                "End-to-end duration of a saga run",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register saga_duration_seconds"),
        }
    }
}

/// Serving metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServingMetrics {
    _private: (),
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServingMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServingMetricsInner {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new)
    }

    /// Record a successful prediction and its latency
    pub fn observe_prediction(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
        self.inner().predictions_served.inc();
    }

    /// Record a prediction answered with a non-success status
    pub fn inc_prediction_rejections(&self, status: u16) {
        let status = status.to_string();
        self.inner()
            .prediction_rejections
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn set_model_state(&self, state: ModelState) {
        self.inner().model_state.set(state as i64);
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version])
            .set(1.0);
    }

    /// Record a completed saga run
    pub fn observe_saga_success(&self, duration_secs: f64) {
        self.inner().saga_runs.with_label_values(&["success"]).inc();
        self.inner().saga_duration_seconds.observe(duration_secs);
    }

    /// Record a failed saga run
    pub fn observe_saga_failure(&self, hop: &str, duration_secs: f64) {
        self.inner().saga_runs.with_label_values(&["failure"]).inc();
        self.inner().saga_hop_failures.with_label_values(&[hop]).inc();
        self.inner().saga_duration_seconds.observe(duration_secs);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for model lifecycle,
/// predictions and saga runs.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            service = %self.service,
            service_version = %version,
            port = port,
            "Service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Service shutting down"
        );
    }

    /// Log a successful model load
    pub fn log_model_loaded(&self, model_version: &str, input_dim: usize) {
        info!(
            event = "model_loaded",
            service = %self.service,
            model_version = %model_version,
            input_dim = input_dim,
            "Model loaded and warmed up"
        );
    }

    /// Log a fatal model load failure
    pub fn log_model_load_failed(&self, model_version: &str, error: &str) {
        error!(
            event = "model_load_failed",
            service = %self.service,
            model_version = %model_version,
            error = %error,
            "Model load failed; restart required to recover"
        );
    }

    /// Log a served prediction
    pub fn log_prediction(
        &self,
        data_id: &str,
        source: Option<&str>,
        correlation_id: Option<&str>,
        prediction: f32,
        latency_ms: u64,
    ) {
        info!(
            event = "prediction_served",
            service = %self.service,
            data_id = %data_id,
            source = ?source,
            correlation_id = ?correlation_id,
            prediction = prediction,
            latency_ms = latency_ms,
            "Served prediction"
        );
    }

    /// Log an inference failure after validation passed
    pub fn log_prediction_failed(&self, data_id: &str, error: &str) {
        error!(
            event = "prediction_failed",
            service = %self.service,
            data_id = %data_id,
            error = %error,
            "Inference failed"
        );
    }

    /// Log a completed saga run
    pub fn log_saga_completed(&self, data_id: &str, prediction: f64, elapsed_ms: u64) {
        info!(
            event = "saga_completed",
            service = %self.service,
            data_id = %data_id,
            prediction = prediction,
            elapsed_ms = elapsed_ms,
            "Saga run completed"
        );
    }

    /// Log a failed saga run with the full underlying cause
    pub fn log_saga_failed(&self, hop: &str, error: &str, elapsed_ms: u64) {
        warn!(
            event = "saga_failed",
            service = %self.service,
            hop = %hop,
            error = %error,
            elapsed_ms = elapsed_ms,
            "Saga run failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_metrics_creation() {
        // Metrics live in the global Prometheus registry and are registered
        // once per process; creating several handles must not panic.
        let metrics = ServingMetrics::new();
        let _again = ServingMetrics::new();

        metrics.observe_prediction(0.002);
        metrics.inc_prediction_rejections(400);
        metrics.set_model_state(ModelState::Ready);
        metrics.set_model_version("v1.0");
        metrics.observe_saga_success(0.05);
        metrics.observe_saga_failure("acquire", 0.01);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("predict");
        assert_eq!(logger.service, "predict");
    }
}
