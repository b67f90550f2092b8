//! Core data models shared by the predict service and the orchestrator

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed-length model input. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Zero-filled vector used for warm-up
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Caller-supplied metadata accompanying a prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionMeta {
    pub feature_count: usize,
    pub data_id: Value,
    pub source: Option<String>,
    pub correlation_id: Option<Value>,
}

/// A validated `/predict` request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub features: FeatureVector,
    pub meta: PredictionMeta,
}

/// Successful `/predict` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Clamped model output, never negative
    pub prediction: f32,
    pub latency_ms: u64,
}

/// Feature record produced by the acquisition service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub data_id: Value,
    pub features: Vec<f64>,
    /// Count reported by the producer; informational only, never forwarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
}

/// Metadata block the saga attaches to its `/predict` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub feature_count: usize,
    pub data_id: Value,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Outgoing `/predict` body built from an acquired record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictPayload {
    pub features: Vec<f64>,
    pub meta: PayloadMeta,
}

/// Value written to `meta.source` by the saga
pub const SAGA_SOURCE: &str = "orchestrator";

impl PredictPayload {
    /// Build the payload for a record. `featureCount` is always recomputed
    /// from the feature array, whatever the producer claimed.
    pub fn from_record(record: &FeatureRecord, correlation_id: Option<String>) -> Self {
        Self {
            features: record.features.clone(),
            meta: PayloadMeta {
                feature_count: record.features.len(),
                data_id: record.data_id.clone(),
                source: SAGA_SOURCE.to_string(),
                correlation_id,
            },
        }
    }
}

/// Fields the saga reads back from a successful `/predict` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub prediction: f64,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub prediction_id: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Aggregated outcome of one saga run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaResult {
    pub data_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_id: Option<Value>,
    pub prediction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

/// Render an opaque identifier for logs (strings without quotes)
pub fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_id() {
        assert_eq!(display_id(&json!("abc")), "abc");
        assert_eq!(display_id(&json!(42)), "42");
        assert_eq!(display_id(&Value::Null), "null");
    }

    #[test]
    fn test_payload_recomputes_feature_count() {
        let record = FeatureRecord {
            data_id: json!("abc"),
            features: vec![1.0, 2.0, 3.0],
            feature_count: Some(12),
        };

        let payload = PredictPayload::from_record(&record, None);
        assert_eq!(payload.meta.feature_count, 3);
        assert_eq!(payload.meta.source, "orchestrator");
        assert_eq!(payload.meta.data_id, json!("abc"));
    }

    #[test]
    fn test_payload_serializes_camel_case_meta() {
        let record = FeatureRecord {
            data_id: json!("abc"),
            features: vec![1.5],
            feature_count: None,
        };

        let body = serde_json::to_value(PredictPayload::from_record(&record, Some("c-1".into())))
            .unwrap();
        assert_eq!(body["meta"]["featureCount"], 1);
        assert_eq!(body["meta"]["dataId"], "abc");
        assert_eq!(body["meta"]["correlationId"], "c-1");

        let without = serde_json::to_value(PredictPayload::from_record(&record, None)).unwrap();
        assert!(without["meta"].get("correlationId").is_none());
    }

    #[test]
    fn test_saga_result_omits_missing_pass_through_fields() {
        let result = SagaResult {
            data_id: json!("abc"),
            prediction_id: None,
            prediction: 4.2,
            timestamp: None,
        };

        let body = serde_json::to_value(&result).unwrap();
        assert_eq!(body, json!({ "dataId": "abc", "prediction": 4.2 }));
    }

    #[test]
    fn test_feature_record_ignores_unknown_fields() {
        let record: FeatureRecord = serde_json::from_value(json!({
            "dataId": "65f0c2",
            "features": [120.5, 118.3],
            "featureCount": 2,
            "scalerVersion": "v1",
            "createdAt": "2024-03-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.features.len(), 2);
        assert_eq!(record.feature_count, Some(2));
    }
}
