use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Face,
    Fingerprint,
    Voice,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Face, Modality::Fingerprint, Modality::Voice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Face => "face",
            Modality::Fingerprint => "fingerprint",
            Modality::Voice => "voice",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face" => Ok(Modality::Face),
            "fingerprint" => Ok(Modality::Fingerprint),
            "voice" => Ok(Modality::Voice),
            other => Err(format!(
                "unknown modality '{}' (expected face, fingerprint or voice)",
                other
            )),
        }
    }
}

/// Numeric descriptor produced by an extractor. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

/// Base64 text of `nonce || ciphertext || tag`. Opaque outside the template manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedTemplate(String);

impl EncryptedTemplate {
    pub fn new(blob: String) -> Self {
        EncryptedTemplate(blob)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Persistence record for one (owner, modality) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTemplate {
    pub template: EncryptedTemplate,
    pub enabled: bool,
    pub enrolled_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBreakdown {
    pub cosine: f64,
    pub distance: f64,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub success: bool,
    pub confidence: f64, // 0-100
    pub similarity: f64, // 0-1
    pub threshold: f64,  // 1 - tolerance
    pub metrics: Option<MetricBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentReceipt {
    pub owner: String,
    pub modality: Modality,
    pub dimensions: usize,
    pub enrolled_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub modality: Modality,
    pub success: bool,
    pub message: String,
    pub result: Option<MatchResult>,
    pub credential: Option<String>,
}

impl Verification {
    pub fn not_enrolled(modality: Modality) -> Self {
        Verification {
            modality,
            success: false,
            message: "not enrolled".to_string(),
            result: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentStatus {
    pub face: bool,
    pub fingerprint: bool,
    pub voice: bool,
}

impl EnrollmentStatus {
    pub fn set(&mut self, modality: Modality, enrolled: bool) {
        match modality {
            Modality::Face => self.face = enrolled,
            Modality::Fingerprint => self.fingerprint = enrolled,
            Modality::Voice => self.voice = enrolled,
        }
    }

    pub fn get(&self, modality: Modality) -> bool {
        match modality {
            Modality::Face => self.face,
            Modality::Fingerprint => self.fingerprint,
            Modality::Voice => self.voice,
        }
    }
}

/// Decoded mono waveform, samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioClip {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    pub face_count: usize,
    pub regions: Vec<FaceRegion>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            QualityGrade::Excellent
        } else if score >= 50.0 {
            QualityGrade::Good
        } else if score >= 30.0 {
            QualityGrade::Fair
        } else {
            QualityGrade::Poor
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            QualityGrade::Excellent => "Fingerprint quality is excellent",
            QualityGrade::Good => "Fingerprint quality is good",
            QualityGrade::Fair => "Fingerprint quality is acceptable, but could be better",
            QualityGrade::Poor => {
                "Fingerprint quality is poor. Please recapture with better lighting and focus"
            }
        }
    }
}

// Capture-time feedback only; never used for matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub grade: QualityGrade,
    pub score: f64,
    pub sharpness: f64,
    pub contrast: f64,
    pub message: String,
}
