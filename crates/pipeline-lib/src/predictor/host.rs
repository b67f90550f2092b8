//! Model host: owns the scoring function and its lifecycle state
//!
//! The host is constructed once at startup in `Loading` and shared by
//! reference with the HTTP layer. `load` performs the single state
//! transition; every request reads the state instead of assuming it.

use super::output::extract_prediction;
use super::scope::TensorPool;
use super::{ArtifactLocation, ModelLoader, ModelSignature, ModelState, ScoringFunction};
use crate::error::ModelError;
use crate::models::FeatureVector;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Inference latency above which a warning is logged
const SLOW_INFERENCE_MS: u128 = 50;

struct LoadedModel {
    scorer: Box<dyn ScoringFunction>,
    signature: ModelSignature,
}

/// Owner of the opaque scoring function and the current [`ModelState`]
pub struct ModelHost {
    state: AtomicU8,
    load_started: AtomicBool,
    model: OnceLock<LoadedModel>,
    model_version: String,
    tensors: TensorPool,
}

impl ModelHost {
    /// Create a host in the `Loading` state
    pub fn new(model_version: impl Into<String>) -> Self {
        Self {
            state: AtomicU8::new(ModelState::Loading as u8),
            load_started: AtomicBool::new(false),
            model: OnceLock::new(),
            model_version: model_version.into(),
            tensors: TensorPool::new(),
        }
    }

    pub fn state(&self) -> ModelState {
        ModelState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Signature of the loaded model, once ready
    pub fn signature(&self) -> Option<&ModelSignature> {
        self.loaded().map(|model| &model.signature)
    }

    /// Required feature vector length, once ready
    pub fn input_dim(&self) -> Option<usize> {
        self.signature().map(|signature| signature.input_dim)
    }

    /// Tensors currently held by in-flight inferences
    pub fn live_tensors(&self) -> usize {
        self.tensors.live()
    }

    /// Load the artifact, resolve its signature and warm it up.
    ///
    /// Runs at most once. Any failure moves the host to `Failed` for good.
    pub async fn load(
        &self,
        loader: &dyn ModelLoader,
        location: &ArtifactLocation,
    ) -> Result<(), ModelError> {
        if self.load_started.swap(true, Ordering::AcqRel) {
            return Err(ModelError::AlreadyLoaded(self.state()));
        }

        let start = Instant::now();
        info!(artifact = %location, version = %self.model_version, "Loading model");

        match self.prepare(loader, location).await {
            Ok(model) => {
                let signature = model.signature.clone();
                if self.model.set(model).is_err() {
                    return Err(ModelError::AlreadyLoaded(self.state()));
                }
                self.transition(ModelState::Ready)?;

                info!(
                    input_name = %signature.input_name,
                    input_dim = signature.input_dim,
                    output_name = %signature.output_name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model ready"
                );
                Ok(())
            }
            Err(err) => {
                self.transition(ModelState::Failed)?;
                error!(
                    artifact = %location,
                    error = %err,
                    "Model load failed, service will not become ready"
                );
                Err(err)
            }
        }
    }

    async fn prepare(
        &self,
        loader: &dyn ModelLoader,
        location: &ArtifactLocation,
    ) -> Result<LoadedModel, ModelError> {
        let scorer = loader.load(location).await?;
        let signature = scorer.signature().clone();

        if signature.input_dim == 0 {
            return Err(ModelError::MalformedSignature(format!(
                "input '{}' declares zero features",
                signature.input_name
            )));
        }

        // Warm-up forces lazy initialization before real traffic arrives
        let warm_up = self.execute(scorer.as_ref(), &FeatureVector::zeros(signature.input_dim))?;
        debug!(output = warm_up, "Warm-up inference completed");

        Ok(LoadedModel { scorer, signature })
    }

    /// Run one inference. The caller has already validated the request,
    /// but readiness and dimension are checked again here.
    pub fn infer(&self, features: &FeatureVector) -> Result<f32, ModelError> {
        let model = self.loaded().ok_or(ModelError::NotReady)?;

        if features.len() != model.signature.input_dim {
            return Err(ModelError::DimensionMismatch {
                expected: model.signature.input_dim,
                received: features.len(),
            });
        }

        let start = Instant::now();
        let prediction = self.execute(model.scorer.as_ref(), features)?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target",
                SLOW_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        Ok(prediction)
    }

    fn execute(
        &self,
        scorer: &dyn ScoringFunction,
        features: &FeatureVector,
    ) -> Result<f32, ModelError> {
        let mut scope = self.tensors.scope();

        let input = scope
            .input(features.as_slice())
            .map_err(|e| ModelError::Execution(format!("{:#}", e)))?;
        let outputs = scorer
            .run(input)
            .map_err(|e| ModelError::Execution(format!("{:#}", e)))?;

        extract_prediction(scope.adopt(outputs))
    }

    /// The only state change: `Loading` to a terminal state
    fn transition(&self, to: ModelState) -> Result<(), ModelError> {
        self.state
            .compare_exchange(
                ModelState::Loading as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| ModelError::AlreadyLoaded(ModelState::from_u8(current)))
    }

    fn loaded(&self) -> Option<&LoadedModel> {
        if self.is_ready() {
            self.model.get()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tract_onnx::prelude::{tvec, TVec, TValue, Tensor};

    struct StubScorer {
        signature: ModelSignature,
        output: f32,
        fail_after: Option<usize>,
        seen: Arc<Mutex<Vec<Vec<f32>>>>,
    }

    impl ScoringFunction for StubScorer {
        fn signature(&self) -> &ModelSignature {
            &self.signature
        }

        fn run(&self, input: Tensor) -> anyhow::Result<TVec<TValue>> {
            assert_eq!(input.shape(), &[1, self.signature.input_dim]);
            let mut seen = self.seen.lock().unwrap();
            seen.push(input.as_slice::<f32>()?.to_vec());
            if self.fail_after.map(|n| seen.len() > n).unwrap_or(false) {
                anyhow::bail!("backend exploded");
            }
            Ok(tvec!(Tensor::from_shape(&[1, 1], &[self.output])?.into()))
        }
    }

    struct StubLoader {
        dim: usize,
        output: f32,
        fail_after: Option<usize>,
        seen: Arc<Mutex<Vec<Vec<f32>>>>,
    }

    impl StubLoader {
        fn new(dim: usize, output: f32) -> Self {
            Self {
                dim,
                output,
                fail_after: None,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl ModelLoader for StubLoader {
        async fn load(
            &self,
            _location: &ArtifactLocation,
        ) -> Result<Box<dyn ScoringFunction>, ModelError> {
            Ok(Box::new(StubScorer {
                signature: ModelSignature {
                    input_name: "dense_input".to_string(),
                    input_dim: self.dim,
                    output_name: "dense_2".to_string(),
                },
                output: self.output,
                fail_after: self.fail_after,
                seen: self.seen.clone(),
            }))
        }
    }

    struct MissingArtifact;

    #[async_trait]
    impl ModelLoader for MissingArtifact {
        async fn load(
            &self,
            location: &ArtifactLocation,
        ) -> Result<Box<dyn ScoringFunction>, ModelError> {
            Err(ModelError::ArtifactUnavailable(format!("{} not found", location)))
        }
    }

    fn location() -> ArtifactLocation {
        ArtifactLocation::Path("model/model.onnx".into())
    }

    #[test]
    fn test_host_starts_loading() {
        let host = ModelHost::new("v1.0");
        assert_eq!(host.state(), ModelState::Loading);
        assert!(!host.is_ready());
        assert!(host.input_dim().is_none());
        assert_eq!(
            host.infer(&FeatureVector::zeros(7)),
            Err(ModelError::NotReady)
        );
    }

    #[tokio::test]
    async fn test_load_warms_up_with_zero_vector() {
        let host = ModelHost::new("v1.0");
        let loader = StubLoader::new(7, 12.0);

        host.load(&loader, &location()).await.unwrap();

        assert_eq!(host.state(), ModelState::Ready);
        assert_eq!(host.input_dim(), Some(7));
        assert_eq!(host.signature().unwrap().input_name, "dense_input");
        assert_eq!(*loader.seen.lock().unwrap(), vec![vec![0.0; 7]]);
        assert_eq!(host.live_tensors(), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_host() {
        let host = ModelHost::new("v1.0");

        let err = host.load(&MissingArtifact, &location()).await.unwrap_err();

        assert!(matches!(err, ModelError::ArtifactUnavailable(_)));
        assert_eq!(host.state(), ModelState::Failed);
        assert_eq!(
            host.infer(&FeatureVector::zeros(7)),
            Err(ModelError::NotReady)
        );
    }

    #[tokio::test]
    async fn test_warm_up_failure_fails_host() {
        let host = ModelHost::new("v1.0");
        let mut loader = StubLoader::new(7, 1.0);
        loader.fail_after = Some(0);

        let err = host.load(&loader, &location()).await.unwrap_err();

        assert!(matches!(err, ModelError::Execution(_)));
        assert_eq!(host.state(), ModelState::Failed);
        assert_eq!(host.live_tensors(), 0);
    }

    #[tokio::test]
    async fn test_zero_dimension_is_malformed() {
        let host = ModelHost::new("v1.0");

        let err = host.load(&StubLoader::new(0, 1.0), &location()).await.unwrap_err();

        assert!(matches!(err, ModelError::MalformedSignature(_)));
        assert_eq!(host.state(), ModelState::Failed);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_second_load() {
        let ready = ModelHost::new("v1.0");
        ready.load(&StubLoader::new(3, 1.0), &location()).await.unwrap();
        let err = ready.load(&MissingArtifact, &location()).await.unwrap_err();
        assert_eq!(err, ModelError::AlreadyLoaded(ModelState::Ready));
        assert_eq!(ready.state(), ModelState::Ready);

        let failed = ModelHost::new("v1.0");
        let _ = failed.load(&MissingArtifact, &location()).await;
        let err = failed.load(&StubLoader::new(3, 1.0), &location()).await.unwrap_err();
        assert_eq!(err, ModelError::AlreadyLoaded(ModelState::Failed));
        assert_eq!(failed.state(), ModelState::Failed);
    }

    #[tokio::test]
    async fn test_infer_clamps_negative_output() {
        let host = ModelHost::new("v1.0");
        host.load(&StubLoader::new(7, -3.2), &location()).await.unwrap();

        let prediction = host.infer(&FeatureVector::new(vec![1.0; 7])).unwrap();

        assert_eq!(prediction, 0.0);
        assert_eq!(host.live_tensors(), 0);
    }

    #[tokio::test]
    async fn test_infer_is_deterministic() {
        let host = ModelHost::new("v1.0");
        host.load(&StubLoader::new(2, 8.25), &location()).await.unwrap();
        let features = FeatureVector::new(vec![3.0, 4.0]);

        assert_eq!(host.infer(&features), host.infer(&features));
    }

    #[tokio::test]
    async fn test_infer_rechecks_dimension() {
        let host = ModelHost::new("v1.0");
        host.load(&StubLoader::new(7, 1.0), &location()).await.unwrap();

        let err = host.infer(&FeatureVector::new(vec![1.0; 6])).unwrap_err();

        assert_eq!(
            err,
            ModelError::DimensionMismatch {
                expected: 7,
                received: 6
            }
        );
    }

    #[tokio::test]
    async fn test_execution_failure_releases_tensors() {
        let host = ModelHost::new("v1.0");
        let mut loader = StubLoader::new(4, 1.0);
        loader.fail_after = Some(1);
        host.load(&loader, &location()).await.unwrap();

        for _ in 0..3 {
            let err = host.infer(&FeatureVector::new(vec![1.0; 4])).unwrap_err();
            assert!(matches!(err, ModelError::Execution(_)));
            assert_eq!(host.live_tensors(), 0);
        }
    }
}
