//! Mock audio backend for testing without hardware.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::{AudioBackend, InputStream, OutputStream, StreamSpec};
use crate::{AudioChunk, MixerError, TrackConfig};

/// A backend that simulates audio hardware.
///
/// Capture streams produce a deterministic 440 Hz sine; playback streams
/// record every written chunk so tests can assert on the emitted order.
/// When pacing is enabled (the default) both directions consume wall-clock
/// time matching the negotiated sample rate, which makes queue backpressure
/// behave as it would against real hardware. This allows testing the full
/// track lifecycle in CI environments.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use track_mixer::{MockBackend, OutputTrack};
///
/// let backend = Arc::new(MockBackend::new());
/// let track = OutputTrack::new("out", backend.clone()).unwrap();
/// // ... play something ...
/// let written = backend.written();
/// # drop(written);
/// # drop(track);
/// ```
pub struct MockBackend {
    paced: bool,
    fail_open: bool,
    written: Arc<Mutex<Vec<AudioChunk>>>,
}

impl MockBackend {
    /// Creates a paced mock backend.
    pub fn new() -> Self {
        Self {
            paced: true,
            fail_open: false,
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a mock backend that does not pace I/O to wall-clock time.
    ///
    /// Reads and writes complete immediately; useful for tests that only
    /// exercise lifecycle transitions.
    pub fn unpaced() -> Self {
        Self {
            paced: false,
            ..Self::new()
        }
    }

    /// Creates a mock backend whose open calls fail with a device error.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    /// Returns a snapshot of every chunk written to any playback stream, in
    /// write order.
    pub fn written(&self) -> Vec<AudioChunk> {
        self.written.lock().clone()
    }

    /// Clears the record of written chunks.
    pub fn clear_written(&self) {
        self.written.lock().clear();
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockBackend {
    fn open_input(&self, config: &TrackConfig) -> Result<Box<dyn InputStream>, MixerError> {
        if self.fail_open {
            return Err(MixerError::Device {
                reason: "mock backend configured to fail".to_string(),
            });
        }
        Ok(Box::new(MockInputStream {
            spec: StreamSpec {
                sample_rate: config.sample_rate,
                channels: config.channels,
            },
            paced: self.paced,
            position: 0,
        }))
    }

    fn open_output(&self, config: &TrackConfig) -> Result<Box<dyn OutputStream>, MixerError> {
        if self.fail_open {
            return Err(MixerError::Device {
                reason: "mock backend configured to fail".to_string(),
            });
        }
        Ok(Box::new(MockOutputStream {
            spec: StreamSpec {
                sample_rate: config.sample_rate,
                channels: config.channels,
            },
            paced: self.paced,
            written: Arc::clone(&self.written),
        }))
    }
}

fn pace(frames: usize, sample_rate: u32) {
    if sample_rate > 0 {
        thread::sleep(Duration::from_secs_f64(
            frames as f64 / f64::from(sample_rate),
        ));
    }
}

struct MockInputStream {
    spec: StreamSpec,
    paced: bool,
    position: u64,
}

impl InputStream for MockInputStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read(&mut self, frames: usize) -> Result<(AudioChunk, bool), MixerError> {
        if self.paced {
            pace(frames, self.spec.sample_rate);
        }

        // Phase-continuous 440 Hz sine across reads
        let rate = f64::from(self.spec.sample_rate.max(1));
        let mut samples = Vec::with_capacity(frames * self.spec.channels as usize);
        for i in 0..frames {
            let t = (self.position + i as u64) as f64 / rate;
            let value = (2.0 * std::f64::consts::PI * 440.0 * t).sin() as f32;
            for _ in 0..self.spec.channels {
                samples.push(value);
            }
        }
        self.position += frames as u64;

        Ok((
            AudioChunk::new(samples, self.spec.sample_rate, self.spec.channels),
            false,
        ))
    }
}

struct MockOutputStream {
    spec: StreamSpec,
    paced: bool,
    written: Arc<Mutex<Vec<AudioChunk>>>,
}

impl OutputStream for MockOutputStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn write(&mut self, chunk: &AudioChunk) -> Result<(), MixerError> {
        self.written.lock().push(chunk.clone());
        if self.paced {
            pace(chunk.frame_count(), self.spec.sample_rate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_input_generates_sine() {
        let backend = MockBackend::unpaced();
        let mut stream = backend.open_input(&TrackConfig::default()).unwrap();

        let (chunk, overflow) = stream.read(512).unwrap();
        assert!(!overflow);
        assert_eq!(chunk.frame_count(), 512);
        assert_eq!(chunk.channels, 2);
        // A sine wave has both positive and negative samples
        assert!(chunk.samples.iter().any(|&s| s > 0.0));
        assert!(chunk.samples.iter().any(|&s| s < 0.0));
    }

    #[test]
    fn test_mock_input_phase_continuous() {
        let backend = MockBackend::unpaced();
        let mut stream = backend.open_input(&TrackConfig::default()).unwrap();

        let (first, _) = stream.read(256).unwrap();
        let (second, _) = stream.read(256).unwrap();
        // Consecutive reads continue the waveform, they don't restart it
        assert_ne!(first.samples[0], second.samples[0]);
    }

    #[test]
    fn test_mock_output_records_writes() {
        let backend = MockBackend::unpaced();
        let mut stream = backend.open_output(&TrackConfig::default()).unwrap();

        let chunk = AudioChunk::new(vec![0.25; 64], 44100, 2);
        stream.write(&chunk).unwrap();
        stream.write(&chunk).unwrap();

        let written = backend.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].samples[0], 0.25);
    }

    #[test]
    fn test_mock_failing_open() {
        let backend = MockBackend::failing();
        assert!(matches!(
            backend.open_input(&TrackConfig::default()),
            Err(MixerError::Device { .. })
        ));
        assert!(matches!(
            backend.open_output(&TrackConfig::default()),
            Err(MixerError::Device { .. })
        ));
    }

    #[test]
    fn test_mock_reports_requested_spec() {
        let backend = MockBackend::unpaced();
        let config = TrackConfig {
            sample_rate: 16000,
            channels: 1,
            ..Default::default()
        };
        let stream = backend.open_input(&config).unwrap();
        assert_eq!(
            stream.spec(),
            StreamSpec {
                sample_rate: 16000,
                channels: 1
            }
        );
    }
}
