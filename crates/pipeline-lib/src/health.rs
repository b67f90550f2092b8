//! Liveness and readiness payloads
//!
//! Liveness never depends on the model. Readiness reports `ready: false`
//! for both `Loading` and `Failed`; callers cannot tell the two apart
//! from this payload alone.

use crate::predictor::ModelState;
use serde::{Deserialize, Serialize};

/// Service names reported by `/health`
pub mod services {
    pub const PREDICT: &str = "predict";
    pub const ORCHESTRATOR: &str = "orchestrator";
}

/// Message attached to a not-ready response
pub const NOT_READY_MESSAGE: &str = "Model is still loading";

/// Liveness response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn ok(service: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.into(),
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub ready: bool,
    pub model_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReadinessResponse {
    /// Build the readiness payload for the current model state
    pub fn for_state(state: ModelState, model_version: impl Into<String>) -> Self {
        let ready = state == ModelState::Ready;
        Self {
            ready,
            model_version: model_version.into(),
            message: (!ready).then(|| NOT_READY_MESSAGE.to_string()),
        }
    }
}
