use crate::models::{AudioClip, Modality};
use crate::processing::Sample;
use crate::utils::{BiometricError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;

// Thin decoding front end. Everything past this point works on decoded buffers.

pub fn decode_image(raw: &[u8]) -> Result<DynamicImage> {
    if raw.is_empty() {
        return Err(BiometricError::InvalidInput("Image data is empty".to_string()));
    }
    let image = image::load_from_memory(raw).map_err(|e| {
        BiometricError::UnsupportedMedia(format!("Cannot read image data: {}", e))
    })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(BiometricError::InvalidInput(
            "Image has no pixel data".to_string(),
        ));
    }
    Ok(image)
}

/// Decode a WAV payload into mono samples scaled to [-1, 1] by the source bit depth.
pub fn decode_audio(raw: &[u8]) -> Result<AudioClip> {
    if raw.is_empty() {
        return Err(BiometricError::InvalidInput("Audio data is empty".to_string()));
    }
    let mut reader = hound::WavReader::new(Cursor::new(raw))
        .map_err(|e| BiometricError::UnsupportedMedia(format!("Invalid audio data: {}", e)))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(BiometricError::UnsupportedMedia(
            "Audio declares zero channels".to_string(),
        ));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = 2f32.powi(spec.bits_per_sample as i32 - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| BiometricError::UnsupportedMedia(format!("Corrupt audio samples: {}", e)))?;

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    log::debug!(
        "Decoded {} mono samples at {} Hz from {} channel(s)",
        samples.len(),
        spec.sample_rate,
        channels
    );
    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// Base64 text with an optional data-URL prefix (`data:image/png;base64,...`).
pub fn decode_transport_payload(text: &str) -> Result<Vec<u8>> {
    let payload = match text.split_once(',') {
        Some((_, body)) => body,
        None => text,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(BiometricError::InvalidInput("Payload is empty".to_string()));
    }
    STANDARD
        .decode(compact)
        .map_err(|e| BiometricError::UnsupportedMedia(format!("Failed to decode base64 data: {}", e)))
}

pub fn load_sample(modality: Modality, raw: &[u8]) -> Result<Sample> {
    match modality {
        Modality::Face | Modality::Fingerprint => decode_image(raw).map(Sample::Image),
        Modality::Voice => decode_audio(raw).map(Sample::Audio),
    }
}
