//! Audio device backends.
//!
//! An [`AudioBackend`] opens capture and playback streams against physical
//! (or simulated) hardware. Tracks call it from their runner thread only;
//! a stream handle never leaves the thread that opened it, and closing is
//! RAII - dropping the stream releases the device.
//!
//! Two implementations ship with the crate:
//!
//! - [`CpalBackend`]: real hardware via CPAL
//! - [`MockBackend`]: deterministic streams for tests and CI, no hardware

mod cpal_backend;
mod mock;

pub use cpal_backend::CpalBackend;
pub use mock::MockBackend;

use crate::{AudioChunk, MixerError, TrackConfig};

/// The effective format negotiated with the device.
///
/// May differ from the requested [`TrackConfig`] when the hardware does not
/// support the requested parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Negotiated sample rate in Hz.
    pub sample_rate: u32,
    /// Negotiated channel count.
    pub channels: u16,
}

/// Opens device streams for tracks.
///
/// Implementations are shared across tracks (`Arc<dyn AudioBackend>`); the
/// open calls happen on each track's runner thread.
pub trait AudioBackend: Send + Sync {
    /// Opens a capture stream with the requested parameters.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::Device`] when no device is available or the
    /// parameters cannot be negotiated.
    fn open_input(&self, config: &TrackConfig) -> Result<Box<dyn InputStream>, MixerError>;

    /// Opens a playback stream with the requested parameters.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::Device`] when no device is available or the
    /// parameters cannot be negotiated.
    fn open_output(&self, config: &TrackConfig) -> Result<Box<dyn OutputStream>, MixerError>;
}

/// An open capture stream.
///
/// Owned exclusively by one runner thread. Dropping the stream closes the
/// device.
pub trait InputStream {
    /// Returns the negotiated format.
    fn spec(&self) -> StreamSpec;

    /// Blocks until `frames` frames are captured and returns them along with
    /// an overflow flag that is `true` when samples were lost since the
    /// previous read.
    fn read(&mut self, frames: usize) -> Result<(AudioChunk, bool), MixerError>;
}

/// An open playback stream.
///
/// Owned exclusively by one runner thread. Dropping the stream closes the
/// device.
pub trait OutputStream {
    /// Returns the negotiated format.
    fn spec(&self) -> StreamSpec;

    /// Blocks until the chunk has been handed to the device.
    fn write(&mut self, chunk: &AudioChunk) -> Result<(), MixerError>;
}
