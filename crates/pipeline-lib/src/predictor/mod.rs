//! Model hosting: lifecycle, warm-up and single-request inference

mod host;
mod inference;
mod output;
mod scope;

pub use host::ModelHost;
pub use inference::{OnnxLoader, OnnxScorer};
pub use output::{clamp_prediction, extract_prediction};
pub use scope::{TensorPool, TensorScope};

use crate::error::ModelError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tract_onnx::prelude::{TVec, TValue, Tensor};
use url::Url;

/// Lifecycle of the hosted model.
///
/// `Loading -> Ready` or `Loading -> Failed`; both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelState {
    Loading = 0,
    Ready = 1,
    Failed = 2,
}

impl ModelState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ModelState::Ready,
            2 => ModelState::Failed,
            _ => ModelState::Loading,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Failed => "failed",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input/output contract declared by the loaded artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSignature {
    pub input_name: String,
    /// Required feature vector length `D`
    pub input_dim: usize,
    pub output_name: String,
}

/// Where the model artifact is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Url(Url),
    Path(PathBuf),
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLocation::Url(url) => write!(f, "{}", url),
            ArtifactLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Opaque scoring function: fixed-length input, one scalar output
pub trait ScoringFunction: Send + Sync {
    fn signature(&self) -> &ModelSignature;

    /// Execute the model on a `[1, D]` input tensor
    fn run(&self, input: Tensor) -> anyhow::Result<TVec<TValue>>;
}

/// Produces a scoring function from an artifact
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, location: &ArtifactLocation)
        -> Result<Box<dyn ScoringFunction>, ModelError>;
}
