//! Sample format and channel conversion.

use crate::MixerError;

/// Converts f32 samples to i16.
///
/// Input should be in the range [-1.0, 1.0]. Values outside this range are
/// clamped.
///
/// Uses x 32767 (not 32768) for symmetric scaling. This means -1.0 maps to
/// -32767 rather than -32768, losing 1 LSB at the negative extreme. This is
/// a common convention that avoids producing out-of-range values.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts i16 samples to f32.
///
/// Output will be in the range [-1.0, 1.0].
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Matches interleaved source audio to a track's channel count.
///
/// - Equal counts pass through unchanged.
/// - Fewer source channels than track channels: each output frame repeats
///   the source channels cyclically, so a mono source against a stereo track
///   carries the same sample on both channels.
/// - More source channels than track channels is not covered by the
///   replication rule and fails with `UnsupportedChannelLayout`; downmixing
///   needs a real mixing matrix, not a silent guess.
pub fn match_channels(
    samples: Vec<f32>,
    source: u16,
    target: u16,
) -> Result<Vec<f32>, MixerError> {
    if source == target {
        return Ok(samples);
    }
    if source == 0 || target == 0 || source > target {
        return Err(MixerError::UnsupportedChannelLayout {
            source_channels: source,
            target,
        });
    }

    let src = source as usize;
    let dst = target as usize;
    let frames = samples.len() / src;
    let mut out = Vec::with_capacity(frames * dst);
    for frame in samples.chunks_exact(src) {
        for ch in 0..dst {
            out.push(frame[ch % src]);
        }
    }
    Ok(out)
}

/// Converts mono samples to stereo by duplicating each sample.
pub fn mono_to_stereo(mono: &[f32]) -> Vec<f32> {
    mono.iter().flat_map(|&s| [s, s]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_full_range() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_i16_to_f32_full_range() {
        let max = i16_to_f32(32767);
        assert!((max - 0.99997).abs() < 0.001);

        let min = i16_to_f32(-32768);
        assert!((min - (-1.0)).abs() < 0.001);

        assert_eq!(i16_to_f32(0), 0.0);
    }

    #[test]
    fn test_roundtrip() {
        for &original in &[0i16, 1000, -1000, 32767, -32768] {
            let f = i16_to_f32(original);
            let back = f32_to_i16(f);
            assert!((original - back).abs() <= 1);
        }
    }

    #[test]
    fn test_match_channels_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let out = match_channels(samples.clone(), 2, 2).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_match_channels_mono_to_stereo_exact_duplicate() {
        let out = match_channels(vec![0.1, 0.2, 0.3], 1, 2).unwrap();
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);

        // Left and right channels are identical, sample for sample
        for frame in out.chunks_exact(2) {
            assert_eq!(frame[0].to_bits(), frame[1].to_bits());
        }
    }

    #[test]
    fn test_match_channels_stereo_to_quad() {
        // [L, R] frames replicate cyclically into [L, R, L, R]
        let out = match_channels(vec![0.1, 0.2, 0.3, 0.4], 2, 4).unwrap();
        assert_eq!(out, vec![0.1, 0.2, 0.1, 0.2, 0.3, 0.4, 0.3, 0.4]);
    }

    #[test]
    fn test_match_channels_downmix_rejected() {
        let err = match_channels(vec![0.0; 12], 6, 2).unwrap_err();
        assert!(matches!(
            err,
            MixerError::UnsupportedChannelLayout {
                source_channels: 6,
                target: 2
            }
        ));
    }

    #[test]
    fn test_match_channels_zero_channels_rejected() {
        assert!(match_channels(vec![], 0, 2).is_err());
        assert!(match_channels(vec![0.0], 1, 0).is_err());
    }

    #[test]
    fn test_mono_to_stereo() {
        let stereo = mono_to_stereo(&[0.25, 0.5]);
        assert_eq!(stereo, vec![0.25, 0.25, 0.5, 0.5]);
    }
}
