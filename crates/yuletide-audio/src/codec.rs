//! PCM conversions for the live endpoint's wire format.
//!
//! Outbound audio is 16 kHz mono signed 16-bit little-endian PCM, inbound
//! audio is the same encoding at 24 kHz. Both travel base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use yuletide_core::AudioError;

pub const SEND_SAMPLE_RATE: u32 = 16_000;
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;
pub const SEND_MIME_TYPE: &str = "audio/pcm;rate=16000";

const PCM16_SCALE: f32 = 32768.0;

/// Nearest-neighbour resample of a mono block.
///
/// Output index `i` reads source index `round(i * from_rate / to_rate)`,
/// clamped to the last source sample. No interpolation and no filtering.
/// Empty input or a zero rate yields an empty block.
pub fn resample(data: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if data.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return data.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (data.len() as f64 / ratio).round() as usize;
    let last = data.len() - 1;

    (0..out_len)
        .map(|i| {
            let src = ((i as f64 * ratio).round() as usize).min(last);
            data[src]
        })
        .collect()
}

/// Convert `[-1, 1]` floats to little-endian i16 bytes (scale by 32768, truncate).
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // `as` truncates toward zero and saturates at the i16 range
        let value = (sample * PCM16_SCALE) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert little-endian i16 bytes to floats by dividing by 32768.
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect()
}

/// PCM16-encode and base64 a block for transmission.
pub fn encode_chunk(samples: &[f32]) -> String {
    STANDARD.encode(encode_pcm16(samples))
}

/// Decode a base64 PCM16 payload into float samples.
pub fn decode_chunk(payload: &str) -> Result<Vec<f32>, AudioError> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AudioError::Decode(e.to_string()))?;
    if bytes.len() % 2 != 0 {
        tracing::debug!(len = bytes.len(), "odd-length PCM16 payload, dropping last byte");
    }
    Ok(decode_pcm16(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate_is_identity() {
        let data = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&data, 16000, 16000), data);
    }

    #[test]
    fn test_resample_empty_input() {
        assert!(resample(&[], 48000, 16000).is_empty());
        assert!(resample(&[], 16000, 16000).is_empty());
    }

    #[test]
    fn test_resample_zero_rate() {
        assert!(resample(&[0.5; 10], 0, 16000).is_empty());
        assert!(resample(&[0.5; 10], 48000, 0).is_empty());
    }

    #[test]
    fn test_resample_downsample_picks_every_third() {
        let data: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let out = resample(&data, 48000, 16000);
        assert_eq!(out, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_resample_upsample_repeats_nearest() {
        // ratio 2/3: source indices round(0), round(0.667), round(1.333)
        let data = vec![10.0, 20.0];
        let out = resample(&data, 16000, 24000);
        assert_eq!(out.len(), 3);
        assert_eq!(out, vec![10.0, 20.0, 20.0]);
    }

    #[test]
    fn test_resample_length_rounds() {
        // 4096 * 16000 / 44100 = 1486.08 -> 1486
        let out = resample(&vec![0.0; 4096], 44100, 16000);
        assert_eq!(out.len(), 1486);
        // 4096 * 16000 / 48000 = 1365.33 -> 1365
        let out = resample(&vec![0.0; 4096], 48000, 16000);
        assert_eq!(out.len(), 1365);
    }

    #[test]
    fn test_resample_never_reads_past_end() {
        // Upsampling: last output index maps past the source and must clamp
        let data = vec![1.0, 2.0, 3.0];
        let out = resample(&data, 8000, 24000);
        assert_eq!(out.len(), 9);
        assert_eq!(*out.last().unwrap(), 3.0);
        assert!(out.iter().all(|s| data.contains(s)));
    }

    #[test]
    fn test_encode_pcm16_little_endian() {
        let bytes = encode_pcm16(&[0.5, -0.5]);
        assert_eq!(bytes, vec![0x00, 0x40, 0x00, 0xC0]);
    }

    #[test]
    fn test_encode_pcm16_truncates_toward_zero() {
        // 0.3 * 32768 = 9830.4 -> 9830; -0.3 -> -9830
        let bytes = encode_pcm16(&[0.3, -0.3]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 9830);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -9830);
    }

    #[test]
    fn test_encode_pcm16_saturates_full_scale() {
        let bytes = encode_pcm16(&[1.0, -1.0, 2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MIN);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), i16::MAX);
    }

    #[test]
    fn test_decode_pcm16_scale() {
        let samples = decode_pcm16(&[0x00, 0x80, 0x00, 0x40, 0x00, 0x00]);
        assert_eq!(samples, vec![-1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_decode_pcm16_ignores_trailing_byte() {
        let samples = decode_pcm16(&[0x00, 0x40, 0x7F]);
        assert_eq!(samples, vec![0.5]);
    }

    #[test]
    fn test_pcm16_round_trip_within_one_step() {
        let input: Vec<f32> = (0..2000)
            .map(|i| ((i as f32) * 0.013).sin() * 0.999)
            .chain([1.0, -1.0, 0.0])
            .collect();
        let output = decode_pcm16(&encode_pcm16(&input));
        assert_eq!(output.len(), input.len());
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_decode_chunk_rejects_bad_base64() {
        let err = decode_chunk("not base64!!").unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn test_encode_chunk_is_standard_base64() {
        // [0x00, 0x40] -> "AEA="
        assert_eq!(encode_chunk(&[0.5]), "AEA=");
        assert_eq!(decode_chunk("AEA=").unwrap(), vec![0.5]);
    }
}
