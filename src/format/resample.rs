//! Sample rate conversion.
//!
//! Conversion goes through rubato's polyphase sinc resampler. The input is
//! deinterleaved into per-channel buffers, processed in fixed blocks with a
//! partial-block flush at the end, and reinterleaved.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::MixerError;

/// Frames fed to the resampler per processing block.
const BLOCK_FRAMES: usize = 1024;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resamples interleaved audio from one sample rate to another.
///
/// Channel layout is preserved. Same-rate or empty input passes through
/// unchanged. The sinc kernel introduces a short transient, so the output
/// length is approximately (not exactly) `len * to_rate / from_rate`.
///
/// # Errors
///
/// Returns [`MixerError::Resample`] for zero rates, a sample count that is
/// not a whole number of frames, or a rubato failure.
pub fn resample(
    samples: &[f32],
    channels: u16,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, MixerError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 || channels == 0 {
        return Err(MixerError::Resample {
            reason: format!(
                "invalid conversion: {from_rate}Hz -> {to_rate}Hz, {channels} channels"
            ),
        });
    }

    let ch = channels as usize;
    if samples.len() % ch != 0 {
        return Err(MixerError::Resample {
            reason: format!(
                "{} samples is not a whole number of {ch}-channel frames",
                samples.len()
            ),
        });
    }

    // Deinterleave into per-channel buffers
    let frames = samples.len() / ch;
    let mut planar = vec![Vec::with_capacity(frames); ch];
    for frame in samples.chunks_exact(ch) {
        for (c, &sample) in frame.iter().enumerate() {
            planar[c].push(sample);
        }
    }

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, sinc_params(), BLOCK_FRAMES, ch)
        .map_err(|e| MixerError::Resample {
            reason: e.to_string(),
        })?;

    let mut out_planar = vec![Vec::with_capacity((frames as f64 * ratio) as usize + 1); ch];
    let append = |blocks: Vec<Vec<f32>>, out: &mut Vec<Vec<f32>>| {
        for (c, block) in blocks.into_iter().enumerate() {
            out[c].extend(block);
        }
    };

    let mut pos = 0;
    while pos + BLOCK_FRAMES <= frames {
        let block: Vec<&[f32]> = planar.iter().map(|c| &c[pos..pos + BLOCK_FRAMES]).collect();
        let out = resampler
            .process(&block, None)
            .map_err(|e| MixerError::Resample {
                reason: e.to_string(),
            })?;
        append(out, &mut out_planar);
        pos += BLOCK_FRAMES;
    }

    // Trailing partial block, then flush the kernel's internal delay
    if pos < frames {
        let tail: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
        let out = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| MixerError::Resample {
                reason: e.to_string(),
            })?;
        append(out, &mut out_planar);
    }
    let out = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| MixerError::Resample {
            reason: e.to_string(),
        })?;
    append(out, &mut out_planar);

    // Reinterleave
    let out_frames = out_planar[0].len();
    let mut interleaved = Vec::with_capacity(out_frames * ch);
    for i in 0..out_frames {
        for channel in &out_planar {
            interleaved.push(channel[i]);
        }
    }
    Ok(interleaved)
}
