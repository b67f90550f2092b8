//! Prediction extraction and post-processing
//!
//! Turns raw model outputs into the single non-negative scalar served to
//! callers. The predicted quantity cannot be negative.

use crate::error::ModelError;
use tract_onnx::prelude::TValue;

/// Lower bound applied to every prediction
pub const MIN_PREDICTION: f32 = 0.0;

/// Extract the scalar prediction from the first output tensor and clamp it
pub fn extract_prediction(outputs: &[TValue]) -> Result<f32, ModelError> {
    let output = outputs
        .first()
        .ok_or_else(|| ModelError::Extraction("model produced no outputs".to_string()))?;

    let view = output
        .to_array_view::<f32>()
        .map_err(|e| ModelError::Extraction(e.to_string()))?;

    let raw = view
        .iter()
        .next()
        .copied()
        .ok_or_else(|| ModelError::Extraction("output tensor is empty".to_string()))?;

    if !raw.is_finite() {
        return Err(ModelError::Extraction(format!("non-finite output {}", raw)));
    }

    Ok(clamp_prediction(raw))
}

/// Clamp a raw model output to the valid prediction domain
pub fn clamp_prediction(raw: f32) -> f32 {
    raw.max(MIN_PREDICTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tract_onnx::prelude::{tvec, Tensor};

    fn output(values: &[f32]) -> TValue {
        Tensor::from_shape(&[1, values.len()], values).unwrap().into()
    }

    #[test]
    fn test_negative_output_clamped_to_zero() {
        assert_eq!(extract_prediction(&[output(&[-3.2])]).unwrap(), 0.0);
    }

    #[test]
    fn test_positive_output_passes_through() {
        assert_eq!(extract_prediction(&[output(&[42.5])]).unwrap(), 42.5);
    }

    #[test]
    fn test_first_element_of_first_output_wins() {
        let outputs = tvec![output(&[1.5, 9.0]), output(&[7.0])];
        assert_eq!(extract_prediction(&outputs).unwrap(), 1.5);
    }

    #[test]
    fn test_no_outputs_is_extraction_error() {
        assert!(matches!(
            extract_prediction(&[]),
            Err(ModelError::Extraction(_))
        ));
    }

    #[test]
    fn test_non_f32_output_is_extraction_error() {
        let ints: TValue = Tensor::from_shape(&[1, 1], &[3i64]).unwrap().into();
        assert!(matches!(
            extract_prediction(&[ints]),
            Err(ModelError::Extraction(_))
        ));
    }

    #[test]
    fn test_nan_output_is_extraction_error() {
        assert!(matches!(
            extract_prediction(&[output(&[f32::NAN])]),
            Err(ModelError::Extraction(_))
        ));
    }
}
