//! File playback pipeline.
//!
//! Turns a decoded file into chunk-sized queue writes on an output track:
//! channel matching, optional resampling to the device rate, chunking, and a
//! writer loop that respects abort signals. The pipeline is the only
//! producer for a track's queue - starting a new playback aborts whatever
//! was in flight first.

use std::path::Path;

use crate::decode;
use crate::format::{match_channels, resample};
use crate::track::{OutputTrack, PlayingDetails, POLL_INTERVAL};
use crate::{AudioChunk, MixerError};

/// Options for a `play_file` invocation.
///
/// # Example
///
/// ```
/// use track_mixer::PlayOptions;
///
/// let options = PlayOptions {
///     blocking: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PlayOptions {
    /// Wait for playback to finish before returning. When `false` (the
    /// default), the call returns as soon as playback audibly starts.
    pub blocking: bool,

    /// Resample the file to the track's device rate. Opting out preserves
    /// the original rate verbatim at the cost of a pitch/speed mismatch.
    /// Default: `true`
    pub resample: bool,

    /// Frames per queued chunk.
    /// Default: 512
    pub chunk_size: usize,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            blocking: false,
            resample: true,
            chunk_size: 512,
        }
    }
}

/// Splits interleaved samples into chunk-sized pieces.
///
/// Every piece holds `chunk_size` frames except a shorter final piece; a
/// buffer smaller than one chunk becomes a single piece.
fn split_chunks(
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    chunk_size: usize,
) -> Vec<AudioChunk> {
    if samples.is_empty() {
        return Vec::new();
    }
    let step = chunk_size.max(1) * channels.max(1) as usize;
    samples
        .chunks(step)
        .map(|piece| AudioChunk::new(piece.to_vec(), sample_rate, channels))
        .collect()
}

pub(crate) async fn play_file(
    track: &OutputTrack,
    path: &Path,
    options: PlayOptions,
) -> Result<(), MixerError> {
    // Single producer per queue: drain whatever is in flight first
    track.abort().await;

    let spec = track
        .device_spec()
        .ok_or_else(|| MixerError::NotRunning {
            name: track.name().to_string(),
        })?;

    // Decode and prepare off the async context; these are heavy, blocking
    // steps
    let path_buf = path.to_path_buf();
    let conversion_dir = track.conversion_dir().map(Path::to_path_buf);
    let do_resample = options.resample;
    let chunk_size = options.chunk_size;
    let prepare = tokio::task::spawn_blocking(
        move || -> Result<(Vec<AudioChunk>, PlayingDetails), MixerError> {
            let decoded = decode::decode_with_fallback(&path_buf, conversion_dir.as_deref())?;
            let samples = match_channels(decoded.samples, decoded.channels, spec.channels)?;

            let (samples, rate) = if do_resample && decoded.sample_rate != spec.sample_rate {
                (
                    resample(&samples, spec.channels, decoded.sample_rate, spec.sample_rate)?,
                    spec.sample_rate,
                )
            } else {
                (samples, decoded.sample_rate)
            };

            let pieces = split_chunks(samples, rate, spec.channels, chunk_size);
            let details = PlayingDetails {
                sample_rate: rate,
                channels: spec.channels,
            };
            Ok((pieces, details))
        },
    );
    let (pieces, details) = prepare.await.map_err(|e| MixerError::TrackFailed {
        name: track.name().to_string(),
        reason: format!("playback preparation failed: {e}"),
    })??;

    tracing::debug!(
        track = track.name(),
        path = %path.display(),
        chunks = pieces.len(),
        sample_rate = details.sample_rate,
        "starting playback"
    );

    let shared = track.shared();
    *shared.playing_details.lock() = Some(details);

    // The writer holds the epoch it started under; an abort moves the epoch
    // and the writer stops at its next write
    let epoch = shared.abort_epoch.load(std::sync::atomic::Ordering::SeqCst);
    let writer_shared = track.shared();
    let writer = tokio::task::spawn_blocking(move || {
        for piece in pieces {
            match writer_shared.write_at_epoch(piece, true, epoch) {
                Ok(_) => {}
                Err(_interrupted) => {
                    tracing::debug!("playback writer interrupted by abort");
                    break;
                }
            }
        }
    });

    if options.blocking {
        let _ = writer.await;
        // Everything is queued; wait for the runner to drain and fall idle
        while shared.is_playing() || !shared.queue.is_empty() {
            if track.is_stopped() {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    } else {
        // Return once playback audibly starts; a short or aborted file may
        // finish before that, so also watch for the writer draining out
        loop {
            if shared.is_playing() {
                break;
            }
            if writer.is_finished() && shared.queue.is_empty() {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks_even() {
        let samples = vec![0.0f32; 2048]; // 1024 stereo frames
        let pieces = split_chunks(samples, 44100, 2, 512);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.frame_count() == 512));
    }

    #[test]
    fn test_split_chunks_short_tail() {
        let samples = vec![0.0f32; 2148]; // 1074 stereo frames
        let pieces = split_chunks(samples, 44100, 2, 512);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[2].frame_count(), 50);
    }

    #[test]
    fn test_split_chunks_smaller_than_one_chunk() {
        let samples = vec![0.0f32; 100];
        let pieces = split_chunks(samples, 44100, 2, 512);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].frame_count(), 50);
    }

    #[test]
    fn test_split_chunks_empty() {
        assert!(split_chunks(Vec::new(), 44100, 2, 512).is_empty());
    }

    #[test]
    fn test_play_options_defaults() {
        let options = PlayOptions::default();
        assert!(!options.blocking);
        assert!(options.resample);
        assert_eq!(options.chunk_size, 512);
    }
}
