//! Error types for track-mixer.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`MixerError`]): fail the lifecycle or playback call
//!   that triggered them
//! - **Control-flow signals** ([`Interrupted`]): expected conditions on the
//!   playback writer path, handled inside the pipeline and never surfaced to
//!   the application

use std::path::PathBuf;

/// Fatal errors from track lifecycle, playback, and collaborator calls.
///
/// Device failures are returned from `start()` (the track stays stopped);
/// decode/resample failures fail only the `play_file` invocation that hit
/// them. A "no available output track" result and a rejected non-blocking
/// write are ordinary control-flow results, not errors.
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    /// The device stream could not be opened or negotiated.
    #[error("device error: {reason}")]
    Device {
        /// What went wrong while opening the stream.
        reason: String,
    },

    /// The file could not be decoded and no usable fallback exists.
    #[error("unsupported format: {path}: {reason}")]
    UnsupportedFormat {
        /// Path to the file that failed to decode.
        path: PathBuf,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The source channel count cannot be matched to the track layout.
    ///
    /// Only upmixing by replication (source channels <= track channels) is
    /// supported; anything else fails explicitly rather than mixing wrong.
    #[error("unsupported channel layout: {source_channels} -> {target} channels")]
    UnsupportedChannelLayout {
        /// Channel count of the decoded source.
        source_channels: u16,
        /// Channel count of the target track.
        target: u16,
    },

    /// Sample rate conversion failed.
    #[error("resample failed: {reason}")]
    Resample {
        /// Resampler diagnostic.
        reason: String,
    },

    /// The external transcoder fallback failed.
    #[error("conversion failed: {path}: {reason}")]
    Conversion {
        /// Path to the file being converted.
        path: PathBuf,
        /// Transcoder diagnostic.
        reason: String,
    },

    /// File I/O error.
    #[error("io error: {path}: {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A track's runner terminated abnormally.
    ///
    /// Raised by the next lifecycle call after a user callback panicked or a
    /// device I/O cycle failed mid-stream.
    #[error("track '{name}' failed: {reason}")]
    TrackFailed {
        /// Name of the affected track.
        name: String,
        /// Why the runner terminated.
        reason: String,
    },

    /// The operation requires a running track.
    #[error("track '{name}' is not running")]
    NotRunning {
        /// Name of the affected track.
        name: String,
    },

    /// One or more per-track operations failed during a mixer fan-out.
    ///
    /// Aggregate operations attempt every track before reporting.
    #[error("{} track operation(s) failed", .errors.len())]
    Aggregate {
        /// The collected per-track failures.
        errors: Vec<MixerError>,
    },
}

/// The abort signal was observed during a queue write.
///
/// This is the expected way a playback producer learns it should stop: the
/// pipeline catches it and ends the writer loop. It is not an error to
/// report upward.
#[derive(Debug, thiserror::Error)]
#[error("write interrupted by abort")]
pub struct Interrupted;
