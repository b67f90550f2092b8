//! Two-hop orchestration saga: acquire, then predict
//!
//! Each run is an independent transaction with no state carried between
//! runs. Hops are strictly sequential, each bounded by a timeout, and a
//! failing hop aborts the run without retry. Failures stay tagged by hop
//! internally; the HTTP boundary collapses all of them into one response.

mod client;

pub use client::{HttpFeatureSource, HttpInferenceClient};

use crate::models::{FeatureRecord, PredictPayload, PredictResponse, SagaResult};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Default bound applied to each hop
pub const DEFAULT_HOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Data-acquisition collaborator
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Produce one feature record
    async fn acquire(&self) -> Result<FeatureRecord, HopFailure>;
}

/// Inference collaborator
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn predict(&self, payload: &PredictPayload) -> Result<PredictResponse, HopFailure>;
}

/// A remote call within the saga
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    Acquire,
    Predict,
}

impl Hop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hop::Acquire => "acquire",
            Hop::Predict => "predict",
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a hop failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HopFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Tagged saga failure: which hop, and why
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{hop} hop failed: {failure}")]
pub struct SagaError {
    pub hop: Hop,
    pub failure: HopFailure,
}

/// Saga tuning
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Bound applied independently to each hop
    pub hop_timeout: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            hop_timeout: DEFAULT_HOP_TIMEOUT,
        }
    }
}

/// Sequences acquisition and inference for one request
#[derive(Clone)]
pub struct Saga {
    source: Arc<dyn FeatureSource>,
    inference: Arc<dyn InferenceClient>,
    config: SagaConfig,
}

impl Saga {
    pub fn new(
        source: Arc<dyn FeatureSource>,
        inference: Arc<dyn InferenceClient>,
        config: SagaConfig,
    ) -> Self {
        Self {
            source,
            inference,
            config,
        }
    }

    /// Run acquire then predict and aggregate the outcome.
    ///
    /// `correlation_id` is forwarded to the predict hop as `meta.correlationId`.
    pub async fn run(&self, correlation_id: Option<String>) -> Result<SagaResult, SagaError> {
        let start = Instant::now();

        let record = self.hop(Hop::Acquire, self.source.acquire()).await?;
        debug!(
            data_id = %record.data_id,
            features = record.features.len(),
            reported_count = ?record.feature_count,
            "Acquired feature record"
        );

        let payload = PredictPayload::from_record(&record, correlation_id);
        let response = self
            .hop(Hop::Predict, self.inference.predict(&payload))
            .await?;

        debug!(
            data_id = %record.data_id,
            prediction = response.prediction,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Predict hop returned"
        );

        Ok(SagaResult {
            data_id: record.data_id,
            prediction_id: response.prediction_id,
            prediction: response.prediction,
            timestamp: response.timestamp,
        })
    }

    async fn hop<T, F>(&self, hop: Hop, call: F) -> Result<T, SagaError>
    where
        F: Future<Output = Result<T, HopFailure>>,
    {
        match tokio::time::timeout(self.config.hop_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(failure)) => Err(SagaError { hop, failure }),
            Err(_) => Err(SagaError {
                hop,
                failure: HopFailure::Timeout(self.config.hop_timeout),
            }),
        }
    }
}
