//! Built-in per-chunk effects.
//!
//! The only built-in effect is the volume gain curve applied by an output
//! track's runner when `apply_basic_fx` is enabled. Applications that manage
//! loudness in their own callback disable it to avoid double gain staging.

use crate::AudioChunk;

/// Maps a volume setting to a linear gain factor.
///
/// Uses a perceptual loudness curve: `2^((vol^(1/8) * 192 - 192) / 6)`.
/// `vol = 1.0` maps to unity gain, `vol = 0.0` to effective silence, and the
/// curve is monotonic over `(0, inf)`. Values above ~1.4 amplify and will
/// clip hot sources.
pub fn volume_gain(vol: f32) -> f32 {
    2f32.powf((vol.powf(1.0 / 8.0) * 192.0 - 192.0) / 6.0)
}

/// Applies the volume curve to a chunk, returning the scaled chunk.
///
/// Stateless and deterministic per chunk, so the result is numerically
/// consistent across chunk boundaries.
pub fn apply_volume(chunk: &AudioChunk, vol: f32) -> AudioChunk {
    let gain = volume_gain(vol);
    if (gain - 1.0).abs() < f32::EPSILON {
        return chunk.clone();
    }
    let samples: Vec<f32> = chunk.samples.iter().map(|s| s * gain).collect();
    AudioChunk::new(samples, chunk.sample_rate, chunk.channels)
}
