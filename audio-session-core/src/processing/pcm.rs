//! Sample-level helpers shared by the capture path and `AudioChunk`.

/// RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Encode f32 samples `[-1.0, 1.0]` as 16-bit little-endian PCM bytes.
///
/// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
pub fn to_pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms_level(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn rms_of_square_wave() {
        assert_relative_eq!(rms_level(&[0.5, -0.5, 0.5, -0.5]), 0.5);
    }

    #[test]
    fn peak_uses_absolute_value() {
        assert_relative_eq!(peak_level(&[0.1, -0.5, 0.3]), 0.5);
    }

    #[test]
    fn pcm16_encoding() {
        let pcm = to_pcm16_le(&[0.0, 1.0, -1.0, 2.0]);

        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        // -1.0 maps to -32767, not i16::MIN
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
        // clamped
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), i16::MAX);
    }
}
