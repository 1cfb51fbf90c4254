use crate::models::Modality;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BiometricError>;

#[derive(Debug, Error)]
pub enum BiometricError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unsupported or corrupt media: {0}")]
    UnsupportedMedia(String),
    #[error("Image too small: {width}x{height} (minimum {min_area} pixels)")]
    ImageTooSmall {
        width: u32,
        height: u32,
        min_area: u32,
    },
    #[error("Audio clip too short: {duration_secs:.2}s (minimum {min_secs:.2}s)")]
    AudioTooShort { duration_secs: f64, min_secs: f64 },
    #[error("Audio clip too long: {duration_secs:.2}s (maximum {max_secs:.2}s)")]
    AudioTooLong { duration_secs: f64, max_secs: f64 },
    #[error("No face detected in the image")]
    NoFaceDetected,
    #[error("Multiple faces detected ({0}); only one face may be visible")]
    MultipleFacesDetected(usize),
    #[error("{modality} encoding failed: {reason}")]
    EncodingFailed { modality: Modality, reason: String },
    #[error("Encryption error: {0}")]
    EncryptionError(String),
    #[error("Decryption error: {0}")]
    DecryptionError(String),
    #[error("Template codec error: {0}")]
    CodecError(String),
    #[error("No {modality} template found for '{owner}'")]
    TemplateNotFound { owner: String, modality: Modality },
    #[error("No extractor registered for {0}")]
    ExtractorUnavailable(Modality),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Credential error: {0}")]
    CredentialError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BiometricError {
    /// Wrap an extractor-internal failure for the given modality.
    pub fn encoding(modality: Modality, reason: impl Into<String>) -> Self {
        BiometricError::EncodingFailed {
            modality,
            reason: reason.into(),
        }
    }

    /// Empty, corrupt, unsupported or out-of-bounds captures. Never retried.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            BiometricError::InvalidInput(_)
                | BiometricError::UnsupportedMedia(_)
                | BiometricError::ImageTooSmall { .. }
                | BiometricError::AudioTooShort { .. }
                | BiometricError::AudioTooLong { .. }
        )
    }

    pub fn suggests_recapture(&self) -> bool {
        self.is_input_error()
            || matches!(
                self,
                BiometricError::NoFaceDetected | BiometricError::MultipleFacesDetected(_)
            )
    }

    // A stored template that cannot be opened or parsed
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            BiometricError::DecryptionError(_) | BiometricError::CodecError(_)
        )
    }
}
