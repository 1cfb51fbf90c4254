use crate::models::{AudioClip, FeatureVector, Modality, VoiceConfig};
use crate::processing::descriptor::{resample_linear, DescriptorBuilder};
use crate::processing::spectrum::{hamming, magnitude_spectrum};
use crate::processing::{FeatureExtractor, Sample};
use crate::utils::{BiometricError, Result};

const FRAME_SECS: f64 = 0.03;
const MIN_FRAME: usize = 512;
const MAX_FRAME: usize = 2048;
const SCALAR_FEATURES: usize = 3;

/// Spectral-statistics voice descriptor: per-bin mean and deviation of the
/// short-time magnitude spectrum, plus energy, zero-crossing rate and centroid.
#[derive(Debug, Clone)]
pub struct VoiceExtractor {
    config: VoiceConfig,
}

impl VoiceExtractor {
    pub fn new(config: VoiceConfig) -> Self {
        VoiceExtractor { config }
    }

    pub fn dimensions(&self) -> usize {
        2 * self.config.spectrum_bins + SCALAR_FEATURES
    }

    fn validate(&self, clip: &AudioClip) -> Result<()> {
        if clip.sample_rate == 0 {
            return Err(BiometricError::InvalidInput(
                "audio sample rate must be positive".to_string(),
            ));
        }
        let duration_secs = clip.duration_secs();
        if clip.samples.is_empty() || duration_secs < self.config.min_duration_secs {
            return Err(BiometricError::AudioTooShort {
                duration_secs,
                min_secs: self.config.min_duration_secs,
            });
        }
        if let Some(max_secs) = self.config.max_duration_secs {
            if duration_secs > max_secs {
                return Err(BiometricError::AudioTooLong {
                    duration_secs,
                    max_secs,
                });
            }
        }
        if clip.samples.iter().any(|s| !s.is_finite()) {
            return Err(BiometricError::InvalidInput(
                "audio contains non-finite samples".to_string(),
            ));
        }
        Ok(())
    }

    // Fixed length (when configured), zero mean, peak scaled to 1
    fn prepare(&self, clip: &AudioClip) -> Result<Vec<f64>> {
        let mut samples: Vec<f64> = clip.samples.iter().map(|s| *s as f64).collect();
        if let Some(target) = self.config.target_duration_secs {
            let length = (target * clip.sample_rate as f64).round() as usize;
            if length > 0 {
                samples.resize(length, 0.0);
            }
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        samples.iter_mut().for_each(|s| *s -= mean);
        let peak = samples.iter().fold(0.0f64, |peak, s| peak.max(s.abs()));
        if peak < 1e-6 {
            return Err(BiometricError::InvalidInput("audio clip is silent".to_string()));
        }
        samples.iter_mut().for_each(|s| *s /= peak + 1e-9);
        Ok(samples)
    }
}

/// Power-of-two frame of roughly 30 ms, clamped to 512..=2048 samples.
pub fn frame_length(sample_rate: u32) -> usize {
    let raw = (sample_rate as f64 * FRAME_SECS) as usize;
    raw.clamp(MIN_FRAME, MAX_FRAME).next_power_of_two().min(MAX_FRAME)
}

struct SpectralStats {
    mean: Vec<f64>,
    deviation: Vec<f64>,
}

fn spectral_statistics(samples: &[f64], frame: usize) -> SpectralStats {
    let hop = (frame / 2).max(1);
    let window = hamming(frame);
    let bins = frame / 2 + 1;
    let mut sum = vec![0.0; bins];
    let mut sum_sq = vec![0.0; bins];
    let mut frames = 0.0;

    let mut buffer = vec![0.0; frame];
    for start in (0..=samples.len().saturating_sub(frame)).step_by(hop) {
        let end = (start + frame).min(samples.len());
        buffer.iter_mut().for_each(|v| *v = 0.0);
        for (i, s) in samples[start..end].iter().enumerate() {
            buffer[i] = s * window[i];
        }
        for (k, magnitude) in magnitude_spectrum(&buffer).into_iter().enumerate() {
            sum[k] += magnitude;
            sum_sq[k] += magnitude * magnitude;
        }
        frames += 1.0;
    }

    let mean: Vec<f64> = sum.iter().map(|s| s / frames).collect();
    let deviation = sum_sq
        .iter()
        .zip(mean.iter())
        .map(|(sq, m)| (sq / frames - m * m).max(0.0).sqrt())
        .collect();
    SpectralStats { mean, deviation }
}

fn zero_crossing_rate(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let changes: f64 = samples
        .windows(2)
        .map(|pair| (pair[1].signum() - pair[0].signum()).abs() / 2.0)
        .sum();
    changes / (samples.len() - 1) as f64
}

// Centroid bin as a fraction of the Nyquist bin
fn normalized_centroid(mean_spectrum: &[f64]) -> f64 {
    let total: f64 = mean_spectrum.iter().sum();
    if total <= 0.0 || mean_spectrum.len() < 2 {
        return 0.0;
    }
    let weighted: f64 = mean_spectrum
        .iter()
        .enumerate()
        .map(|(k, m)| k as f64 * m)
        .sum();
    weighted / total / (mean_spectrum.len() - 1) as f64
}

impl FeatureExtractor for VoiceExtractor {
    fn modality(&self) -> Modality {
        Modality::Voice
    }

    fn extract(&self, sample: &Sample) -> Result<FeatureVector> {
        let clip = sample.as_audio(Modality::Voice)?;
        self.validate(clip)?;
        let samples = self.prepare(clip)?;

        let frame = frame_length(clip.sample_rate);
        let stats = spectral_statistics(&samples, frame);
        let energy = samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64;
        let scalars = [
            energy,
            zero_crossing_rate(&samples),
            normalized_centroid(&stats.mean),
        ];
        log::debug!(
            "Voice clip {:.2}s at {} Hz, frame {} samples",
            clip.duration_secs(),
            clip.sample_rate,
            frame
        );

        let bins = self.config.spectrum_bins;
        let mut builder = DescriptorBuilder::with_capacity(self.dimensions());
        builder
            .push_raw(&resample_linear(&stats.mean, bins))
            .push_raw(&resample_linear(&stats.deviation, bins))
            .push_raw(&scalars);
        Ok(builder.finish())
    }
}
