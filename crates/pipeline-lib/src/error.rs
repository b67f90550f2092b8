//! Error taxonomy for the serving path
//!
//! Saga hop failures live with the saga in [`crate::saga`].

use crate::predictor::ModelState;
use thiserror::Error;

/// Malformed or internally inconsistent `/predict` request (400)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Missing features")]
    MissingFeatures,

    #[error("Missing meta object")]
    MissingMeta,

    #[error("featureCount must be {expected}, received {received}")]
    FeatureCountMismatch { expected: usize, received: String },

    #[error("features must be an array of {expected} numbers")]
    InvalidFeatures { expected: usize },
}

/// Errors raised by the model host
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Artifact could not be fetched or read
    #[error("model artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("model artifact checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("malformed model signature: {0}")]
    MalformedSignature(String),

    /// Inference backend could not parse or optimize the artifact
    #[error("inference backend initialization failed: {0}")]
    Backend(String),

    #[error("model already left the loading state ({0})")]
    AlreadyLoaded(ModelState),

    #[error("model is not ready")]
    NotReady,

    #[error("input has {received} features, model expects {expected}")]
    DimensionMismatch { expected: usize, received: usize },

    #[error("scoring function failed: {0}")]
    Execution(String),

    #[error("could not extract prediction from model output: {0}")]
    Extraction(String),
}
