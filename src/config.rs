//! Configuration types for tracks.

/// Device and buffering parameters for a track.
///
/// Passed explicitly to [`InputTrack`](crate::InputTrack) and
/// [`OutputTrack`](crate::OutputTrack) constructors; there is no process-wide
/// default state. The backend negotiates with the hardware and may report a
/// different effective format - see
/// [`StreamSpec`](crate::device::StreamSpec).
///
/// # Example
///
/// ```
/// use track_mixer::TrackConfig;
///
/// let config = TrackConfig {
///     sample_rate: 48000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Requested sample rate in Hz.
    ///
    /// Default: 44100
    pub sample_rate: u32,

    /// Requested channel count (1 = mono, 2 = stereo).
    ///
    /// Default: 2
    pub channels: u16,

    /// Frames per device I/O cycle.
    ///
    /// Capture reads and playback writes move one chunk of this many frames
    /// per runner cycle. Smaller values reduce latency but increase overhead.
    /// Default: 512
    pub chunk_size: usize,

    /// Capacity of an output track's playback queue, in chunks.
    ///
    /// Bounds how much decoded audio can be in flight ahead of the hardware.
    /// Default: 50
    pub queue_capacity: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            chunk_size: 512,
            queue_capacity: 50,
        }
    }
}
