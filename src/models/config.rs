use crate::models::Modality;
use crate::utils::{BiometricError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SECRET_ENV: &str = "BIOGUARD_TEMPLATE_SECRET";
pub const SALT_ENV: &str = "BIOGUARD_TEMPLATE_SALT";

/// Relative weights of the three similarity metrics. Normalized by their sum at scoring time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub cosine: f64,
    pub distance: f64,
    pub correlation: f64,
}

impl MetricWeights {
    pub const fn new(cosine: f64, distance: f64, correlation: f64) -> Self {
        MetricWeights {
            cosine,
            distance,
            correlation,
        }
    }

    pub const fn cosine_only() -> Self {
        MetricWeights::new(1.0, 0.0, 0.0)
    }

    pub fn total(&self) -> f64 {
        self.cosine + self.distance + self.correlation
    }

    fn validate(&self, modality: Modality) -> Result<()> {
        let all = [self.cosine, self.distance, self.correlation];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) || self.total() <= 0.0 {
            return Err(BiometricError::ConfigError(format!(
                "{} weights must be non-negative with a positive sum",
                modality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: MetricWeights,
    /// threshold = 1 - tolerance
    pub tolerance: f64,
}

impl ScoringConfig {
    pub fn threshold(&self) -> f64 {
        1.0 - self.tolerance
    }

    fn validate(&self, modality: Modality) -> Result<()> {
        self.weights.validate(modality)?;
        validate_tolerance(self.tolerance)
    }
}

pub fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&tolerance) {
        return Err(BiometricError::InvalidInput(format!(
            "tolerance must be within [0, 1], got {}",
            tolerance
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub secret: String,
    pub salt: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        CipherConfig {
            secret: "bioguard-template-secret-change-in-production".to_string(),
            salt: "bioguard-template-salt-change-in-production".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    pub scoring: ScoringConfig,
    /// Smallest accepted face side, in pixels
    pub min_face_size: u32,
    pub padding_ratio: f64,
    pub canonical_size: u32,
    /// Share of the bounding box a candidate region must cover
    pub min_fill_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Regions covering more of the frame than this are background
    pub max_area_ratio: f64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        FaceConfig {
            scoring: ScoringConfig {
                weights: MetricWeights::new(0.5, 0.3, 0.2),
                tolerance: 0.10,
            },
            min_face_size: 40,
            padding_ratio: 0.1,
            canonical_size: 128,
            min_fill_ratio: 0.5,
            max_aspect_ratio: 2.0,
            max_area_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub scoring: ScoringConfig,
    pub min_area: u32,
    pub canonical_size: u32,
    /// Coordinate slots per minutia kind
    pub max_minutiae: usize,
    pub border_margin: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        FingerprintConfig {
            scoring: ScoringConfig {
                weights: MetricWeights::new(0.6, 0.25, 0.15),
                tolerance: 0.20,
            },
            min_area: 10_000,
            canonical_size: 256,
            max_minutiae: 32,
            border_margin: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub scoring: ScoringConfig,
    pub min_duration_secs: f64,
    pub max_duration_secs: Option<f64>,
    /// Pad or trim every clip to exactly this length before extraction
    pub target_duration_secs: Option<f64>,
    pub spectrum_bins: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            scoring: ScoringConfig {
                weights: MetricWeights::new(0.6, 0.25, 0.15),
                tolerance: 0.20,
            },
            min_duration_secs: 0.3,
            max_duration_secs: None,
            target_duration_secs: None,
            spectrum_bins: 96,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricConfig {
    pub cipher: CipherConfig,
    pub face: FaceConfig,
    pub fingerprint: FingerprintConfig,
    pub voice: VoiceConfig,
}

impl BiometricConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BiometricError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: BiometricConfig = serde_json::from_str(text)
            .map_err(|e| BiometricError::ConfigError(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // Secret and salt from the environment win over file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            self.cipher.secret = secret;
        }
        if let Ok(salt) = std::env::var(SALT_ENV) {
            self.cipher.salt = salt;
        }
        self
    }

    pub fn scoring(&self, modality: Modality) -> &ScoringConfig {
        match modality {
            Modality::Face => &self.face.scoring,
            Modality::Fingerprint => &self.fingerprint.scoring,
            Modality::Voice => &self.voice.scoring,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cipher.secret.is_empty() {
            return Err(BiometricError::ConfigError(
                "cipher secret must not be empty".to_string(),
            ));
        }
        for modality in Modality::ALL {
            self.scoring(modality)
                .validate(modality)
                .map_err(|e| BiometricError::ConfigError(format!("{}: {}", modality, e)))?;
        }
        if self.face.canonical_size < 16 || self.fingerprint.canonical_size < 32 {
            return Err(BiometricError::ConfigError(
                "canonical sizes are too small".to_string(),
            ));
        }
        if self.face.padding_ratio < 0.0 || self.face.min_fill_ratio > 1.0 {
            return Err(BiometricError::ConfigError(
                "face padding and fill ratios are out of range".to_string(),
            ));
        }
        if self.voice.spectrum_bins == 0 || self.voice.min_duration_secs < 0.0 {
            return Err(BiometricError::ConfigError(
                "voice bins and minimum duration must be positive".to_string(),
            ));
        }
        if let Some(max) = self.voice.max_duration_secs {
            if max < self.voice.min_duration_secs {
                return Err(BiometricError::ConfigError(
                    "voice maximum duration is below the minimum".to_string(),
                ));
            }
        }
        Ok(())
    }
}
