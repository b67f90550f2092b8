//! `/predict` request validation
//!
//! Checks run in a fixed order and the first failure wins: presence of
//! `features`, presence of `meta`, the declared `featureCount`, then the
//! shape of `features` itself. The count and shape checks are independent;
//! a request must pass both.

use crate::error::ValidationError;
use crate::models::{FeatureVector, PredictionMeta, PredictionRequest};
use serde_json::{Map, Value};

impl PredictionRequest {
    /// Parse and validate a raw request body against model dimension `expected_dim`
    pub fn parse(body: &[u8], expected_dim: usize) -> Result<Self, ValidationError> {
        let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)?
        };

        Self::from_value(&value, expected_dim)
    }

    /// Validate an already-decoded JSON body
    pub fn from_value(body: &Value, expected_dim: usize) -> Result<Self, ValidationError> {
        let features = match body.get("features") {
            None | Some(Value::Null) => return Err(ValidationError::MissingFeatures),
            Some(features) => features,
        };

        let meta = body
            .get("meta")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingMeta)?;

        let feature_count = meta.get("featureCount");
        if !declares_count(feature_count, expected_dim) {
            return Err(ValidationError::FeatureCountMismatch {
                expected: expected_dim,
                received: feature_count
                    .map(Value::to_string)
                    .unwrap_or_else(|| "missing".to_string()),
            });
        }

        let features = numeric_array(features, expected_dim)
            .ok_or(ValidationError::InvalidFeatures {
                expected: expected_dim,
            })?;

        Ok(Self {
            features,
            meta: PredictionMeta {
                feature_count: expected_dim,
                data_id: meta.get("dataId").cloned().unwrap_or(Value::Null),
                source: meta.get("source").and_then(Value::as_str).map(str::to_string),
                correlation_id: meta.get("correlationId").filter(|v| !v.is_null()).cloned(),
            },
        })
    }
}

fn declares_count(value: Option<&Value>, expected: usize) -> bool {
    value
        .and_then(Value::as_f64)
        .map(|count| count == expected as f64)
        .unwrap_or(false)
}

fn numeric_array(value: &Value, expected: usize) -> Option<FeatureVector> {
    let items = value.as_array()?;
    if items.len() != expected {
        return None;
    }

    items
        .iter()
        .map(|item| item.as_f64().map(|v| v as f32).filter(|v| v.is_finite()))
        .collect::<Option<Vec<f32>>>()
        .map(FeatureVector::new)
}
