use crate::models::FeatureVector;
use crate::utils::{BiometricError, Result};

/// Feature vectors travel inside templates as a JSON array of floats.
pub struct FeatureCodec;

impl FeatureCodec {
    pub fn serialize(vector: &FeatureVector) -> Result<String> {
        if let Some(index) = vector.as_slice().iter().position(|v| !v.is_finite()) {
            return Err(BiometricError::CodecError(format!(
                "Feature {} is not a finite number",
                index
            )));
        }
        serde_json::to_string(vector)
            .map_err(|e| BiometricError::CodecError(format!("Failed to serialize features: {}", e)))
    }

    pub fn deserialize(text: &str) -> Result<FeatureVector> {
        serde_json::from_str(text).map_err(|e| {
            BiometricError::CodecError(format!("Failed to deserialize features: {}", e))
        })
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<FeatureVector> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| BiometricError::CodecError(format!("Template is not UTF-8: {}", e)))?;
        Self::deserialize(text)
    }
}
