//! Orchestrator configuration

use anyhow::{Context, Result};
use pipeline_lib::saga::SagaConfig;
use serde::Deserialize;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the acquisition service
    #[serde(default = "default_acquire_url")]
    pub acquire_url: String,

    /// Base URL of the predict service
    #[serde(default = "default_predict_url")]
    pub predict_url: String,

    /// Per-hop timeout in milliseconds
    #[serde(default = "default_hop_timeout_ms")]
    pub hop_timeout_ms: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_acquire_url() -> String {
    "http://acquire:3001".to_string()
}

fn default_predict_url() -> String {
    "http://predict:3002".to_string()
}

fn default_hop_timeout_ms() -> u64 {
    10_000
}

impl OrchestratorConfig {
    /// Load configuration from `ORCHESTRATOR_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder().add_source(config::Environment::with_prefix("ORCHESTRATOR")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Self = builder
            .build()?
            .try_deserialize()
            .context("Invalid orchestrator configuration")?;

        if config.hop_timeout_ms == 0 {
            anyhow::bail!("hop_timeout_ms must be greater than zero");
        }
        Ok(config)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            hop_timeout: Duration::from_millis(self.hop_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::from_builder(config::Config::builder()).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.acquire_url, "http://acquire:3001");
        assert_eq!(config.predict_url, "http://predict:3002");
        assert_eq!(config.saga_config().hop_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = OrchestratorConfig::from_builder(
            config::Config::builder()
                .set_override("hop_timeout_ms", 250)
                .unwrap()
                .set_override("predict_url", "http://localhost:3002")
                .unwrap(),
        )
        .unwrap();

        assert_eq!(config.predict_url, "http://localhost:3002");
        assert_eq!(config.saga_config().hop_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = OrchestratorConfig::from_builder(
            config::Config::builder()
                .set_override("hop_timeout_ms", 0)
                .unwrap(),
        );

        assert!(result.is_err());
    }
}
