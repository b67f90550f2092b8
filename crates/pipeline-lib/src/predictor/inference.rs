//! ONNX inference using tract
//!
//! Fetches the model artifact (over HTTP or from disk), optionally pins its
//! SHA-256, resolves the input/output signature and builds an optimized
//! runnable plan for a `[1, D]` input.

use super::{ArtifactLocation, ModelLoader, ModelSignature, ScoringFunction};
use crate::error::ModelError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::internal::DimLike;
use tracing::{debug, info};

/// Upper bound on artifact download time
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Scoring function backed by an optimized tract plan
pub struct OnnxScorer {
    plan: TractModel,
    signature: ModelSignature,
}

impl OnnxScorer {
    /// Parse an ONNX model, resolve its signature and optimize it
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self, ModelError> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| ModelError::Backend(format!("Failed to parse ONNX model: {:#}", e)))?;

        let signature = Self::resolve_signature(&model)?;
        let plan = Self::optimize(model, signature.input_dim)
            .map_err(|e| ModelError::Backend(format!("{:#}", e)))?;

        debug!(
            input_name = %signature.input_name,
            input_dim = signature.input_dim,
            output_name = %signature.output_name,
            "ONNX model optimized"
        );

        Ok(Self { plan, signature })
    }

    fn resolve_signature(model: &InferenceModel) -> Result<ModelSignature, ModelError> {
        let input = model
            .input_outlets()
            .ok()
            .and_then(|outlets| outlets.first().copied())
            .ok_or_else(|| ModelError::MalformedSignature("model declares no inputs".into()))?;
        let output = model
            .output_outlets()
            .ok()
            .and_then(|outlets| outlets.first().copied())
            .ok_or_else(|| ModelError::MalformedSignature("model declares no outputs".into()))?;

        let input_name = Self::tensor_name(model, input);
        let output_name = Self::tensor_name(model, output);

        let typed = model
            .clone()
            .into_typed()
            .map_err(|e| ModelError::MalformedSignature(format!("{:#}", e)))?;
        let fact = typed
            .input_fact(0)
            .map_err(|e| ModelError::MalformedSignature(format!("{:#}", e)))?;

        if fact.rank() != 2 {
            return Err(ModelError::MalformedSignature(format!(
                "input '{}' has rank {}, expected [batch, features]",
                input_name,
                fact.rank()
            )));
        }

        let input_dim = fact.shape[1].to_usize().map_err(|_| {
            ModelError::MalformedSignature(format!(
                "input '{}' has non-concrete feature dimension {}",
                input_name, fact.shape[1]
            ))
        })?;

        Ok(ModelSignature {
            input_name,
            input_dim,
            output_name,
        })
    }

    /// ONNX tensor name of an outlet; the producing node's name when unlabeled
    fn tensor_name(model: &InferenceModel, outlet: OutletId) -> String {
        model
            .outlet_label(outlet)
            .map(str::to_string)
            .unwrap_or_else(|| model.node(outlet.node).name.clone())
    }

    fn optimize(model: InferenceModel, input_dim: usize) -> Result<TractModel> {
        let plan = model
            .with_input_fact(0, f32::fact([1, input_dim]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(plan)
    }
}

impl ScoringFunction for OnnxScorer {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn run(&self, input: Tensor) -> Result<TVec<TValue>> {
        Ok(self.plan.run(tvec!(input.into()))?)
    }
}

/// Loads ONNX artifacts from a URL or a local path
pub struct OnnxLoader {
    client: reqwest::Client,
    expected_sha256: Option<String>,
}

impl OnnxLoader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            expected_sha256: None,
        })
    }

    /// Reject artifacts whose SHA-256 differs from `checksum` (hex)
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_sha256 = Some(checksum.into());
        self
    }

    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, ModelError> {
        match location {
            ArtifactLocation::Url(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| ModelError::ArtifactUnavailable(format!("{}: {}", url, e)))?;

                if !response.status().is_success() {
                    return Err(ModelError::ArtifactUnavailable(format!(
                        "{} returned {}",
                        url,
                        response.status()
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ModelError::ArtifactUnavailable(format!("{}: {}", url, e)))?;
                Ok(bytes.to_vec())
            }
            ArtifactLocation::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                ModelError::ArtifactUnavailable(format!("{}: {}", path.display(), e))
            }),
        }
    }

    fn verify(&self, bytes: &[u8]) -> Result<String, ModelError> {
        let actual = hex::encode(Sha256::digest(bytes));

        if let Some(expected) = &self.expected_sha256 {
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(ModelError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(actual)
    }
}

#[async_trait]
impl ModelLoader for OnnxLoader {
    async fn load(
        &self,
        location: &ArtifactLocation,
    ) -> Result<Box<dyn ScoringFunction>, ModelError> {
        let bytes = self.fetch(location).await?;
        let checksum = self.verify(&bytes)?;

        info!(
            artifact = %location,
            size_bytes = bytes.len(),
            sha256 = %checksum,
            "Model artifact fetched"
        );

        let scorer = tokio::task::spawn_blocking(move || OnnxScorer::from_bytes(&bytes))
            .await
            .map_err(|e| ModelError::Backend(format!("model build task failed: {}", e)))??;

        Ok(Box::new(scorer))
    }
}
