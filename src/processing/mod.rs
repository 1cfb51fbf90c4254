pub mod descriptor;
pub mod face;
pub mod fingerprint;
pub mod media;
pub mod spectrum;
pub mod synthetic;
pub mod voice;

pub use face::{FaceDetector, FaceExtractor};
pub use fingerprint::FingerprintExtractor;
pub use voice::VoiceExtractor;

use crate::models::{AudioClip, FeatureVector, Modality};
use crate::utils::{BiometricError, Result};
use image::DynamicImage;

/// An already-decoded capture handed to an extractor.
#[derive(Debug, Clone)]
pub enum Sample {
    Image(DynamicImage),
    Audio(AudioClip),
}

impl Sample {
    pub fn kind(&self) -> &'static str {
        match self {
            Sample::Image(_) => "image",
            Sample::Audio(_) => "audio",
        }
    }

    pub fn as_image(&self, modality: Modality) -> Result<&DynamicImage> {
        match self {
            Sample::Image(image) => Ok(image),
            Sample::Audio(_) => Err(BiometricError::InvalidInput(format!(
                "{} capture must be an image, got audio",
                modality
            ))),
        }
    }

    pub fn as_audio(&self, modality: Modality) -> Result<&AudioClip> {
        match self {
            Sample::Audio(clip) => Ok(clip),
            Sample::Image(_) => Err(BiometricError::InvalidInput(format!(
                "{} capture must be audio, got an image",
                modality
            ))),
        }
    }
}

/// Common shape of the face, fingerprint and voice pipelines.
pub trait FeatureExtractor: Send + Sync {
    fn modality(&self) -> Modality;

    fn extract(&self, sample: &Sample) -> Result<FeatureVector>;
}
