//! Audio data chunk.

use std::sync::Arc;
use std::time::Duration;

/// A discrete buffer of audio samples.
///
/// `AudioChunk` is the unit of audio passed between producers (file playback,
/// capture, user callbacks) and the per-track runner. Samples are interleaved
/// 32-bit floats in frames-major order: all channels of frame 0, then all
/// channels of frame 1, and so on.
///
/// Samples are stored in an `Arc<Vec<f32>>` so a chunk can be handed through
/// a queue or slot without copying the audio data.
///
/// # Example
///
/// ```
/// use track_mixer::AudioChunk;
/// use std::time::Duration;
///
/// let chunk = AudioChunk::new(vec![0.0f32; 882], 44100, 2);
/// assert_eq!(chunk.frame_count(), 441);
/// assert_eq!(chunk.duration(), Duration::from_millis(10));
///
/// // Cheap clone - shares sample data
/// let chunk2 = chunk.clone();
/// ```
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in 32-bit float format.
    ///
    /// Wrapped in `Arc` for zero-copy transit through queues and slots.
    pub samples: Arc<Vec<f32>>,

    /// Sample rate in Hz (e.g., 16000, 44100, 48000).
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl AudioChunk {
    /// Creates a new `AudioChunk` with the given parameters.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels,
        }
    }

    /// Creates a new `AudioChunk` from pre-wrapped Arc samples.
    pub fn from_arc(samples: Arc<Vec<f32>>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Returns the number of audio frames in this chunk.
    ///
    /// A frame contains one sample per channel.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Returns the duration of this audio chunk.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Returns `true` if this chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
