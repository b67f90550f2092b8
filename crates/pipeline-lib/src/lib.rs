//! Pipeline library for energy-demand prediction serving
//!
//! This crate provides the core functionality for:
//! - Model lifecycle and single-request inference (`predictor`)
//! - Prediction request validation
//! - The acquire -> predict orchestration saga
//! - Health/readiness payloads and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod saga;
pub mod validation;

pub use error::{ModelError, ValidationError};
pub use health::{HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{ServingMetrics, StructuredLogger};
