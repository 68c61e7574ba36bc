//! Linear 16-bit PCM conversion and base64 transport encoding

use crate::{LiveError, Result};
use base64::prelude::*;

/// Scale between a unit float sample and a signed 16-bit sample
pub const PCM16_SCALE: f32 = 32768.0;

/// Convert one float sample in [-1, 1] to 16-bit PCM.
///
/// Values at or above 1.0 are clamped to `i16::MAX` instead of wrapping.
pub fn f32_to_pcm16(sample: f32) -> i16 {
    (sample * PCM16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert one 16-bit PCM sample back to a float in [-1, 1)
pub fn pcm16_to_f32(sample: i16) -> f32 {
    sample as f32 / PCM16_SCALE
}

/// Encode float samples as little-endian 16-bit PCM bytes
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&f32_to_pcm16(sample).to_le_bytes());
    }
    bytes
}

/// Decode little-endian 16-bit PCM bytes into float samples
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.is_empty() {
        return Err(LiveError::DecodeError("empty audio payload".into()));
    }
    if bytes.len() % 2 != 0 {
        return Err(LiveError::DecodeError(format!(
            "odd PCM16 payload length: {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| pcm16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}

/// Base64 text for a binary payload
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Decode base64 text, classifying failures as decode errors
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(data)
        .map_err(|e| LiveError::DecodeError(format!("invalid base64 audio payload: {}", e)))
}

/// MIME type announced for outbound PCM at the given rate
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}
