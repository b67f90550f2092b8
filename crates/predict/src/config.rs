//! Predict service configuration

use crate::api::MODEL_ROUTE_PREFIX;
use anyhow::{Context, Result};
use pipeline_lib::predictor::ArtifactLocation;
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

/// Predict service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PredictConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/model/`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Artifact file name inside `model_dir`
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// Explicit artifact location (`http(s)://` or `file://`); defaults to
    /// this service's own `/model/` route
    #[serde(default)]
    pub model_url: Option<String>,

    /// Version reported by `/ready`
    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Expected SHA-256 (hex) of the artifact
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Service name reported by `/health`
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_port() -> u16 {
    3002
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("model")
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_model_version() -> String {
    "v1.0".to_string()
}

fn default_service_name() -> String {
    pipeline_lib::health::services::PREDICT.to_string()
}

impl PredictConfig {
    /// Load configuration from `PREDICT_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder().add_source(config::Environment::with_prefix("PREDICT")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .build()?
            .try_deserialize()
            .context("Invalid predict configuration")
    }

    /// Resolve where the model artifact is loaded from
    pub fn artifact_location(&self) -> Result<ArtifactLocation> {
        let url = match &self.model_url {
            Some(url) => Url::parse(url).with_context(|| format!("Invalid model URL {}", url))?,
            None => Url::parse(&format!(
                "http://localhost:{}/{}/{}",
                self.port, MODEL_ROUTE_PREFIX, self.model_file
            ))
            .context("Invalid model file name")?,
        };

        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("Invalid model file URL {}", url))?;
            return Ok(ArtifactLocation::Path(path));
        }

        Ok(ArtifactLocation::Url(url))
    }
}
