//! Playback track.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::device::{AudioBackend, StreamSpec};
use crate::effects;
use crate::playback::{self, PlayOptions};
use crate::queue::ChunkQueue;
use crate::track::{
    panic_reason, wait_started, wait_stopped, LifecycleState, OutputCallback, TrackInfo,
    POLL_INTERVAL,
};
use crate::{AudioChunk, Interrupted, MixerError, TrackConfig};

/// Format of the material currently queued on an output track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayingDetails {
    /// Sample rate of the audio being played, in Hz.
    pub sample_rate: u32,
    /// Channel count of the audio being played.
    pub channels: u16,
}

/// Construction options for an [`OutputTrack`].
pub struct OutputOptions {
    /// Device parameters and queue capacity.
    pub config: TrackConfig,
    /// Initial volume. 1.0 is unity gain; values above ~1.4 amplify.
    pub volume: f32,
    /// Whether the runner applies the built-in volume curve to outgoing
    /// chunks. Disable when a callback already manages gain.
    pub apply_basic_fx: bool,
    /// Directory for `ffmpeg` conversions of formats the decoder cannot
    /// probe. `None` turns decode failures into errors instead.
    pub conversion_dir: Option<PathBuf>,
    /// Optional transform callback run every output cycle.
    pub callback: Option<OutputCallback>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            config: TrackConfig::default(),
            volume: 1.0,
            apply_basic_fx: true,
            conversion_dir: None,
            callback: None,
        }
    }
}

/// State shared between the track handle, the runner thread, and playback
/// pipeline writers.
pub(crate) struct OutputShared {
    pub lifecycle: LifecycleState,
    pub queue: ChunkQueue,
    pub playing: AtomicBool,
    /// Runner acknowledgement-based queue clear request; see `abort()`.
    pub clear_signal: AtomicBool,
    /// Bumped on every abort. Writers capture the epoch when they begin and
    /// stop as soon as it moves, which closes the race where the runner acks
    /// the clear signal before a writer observes it.
    pub abort_epoch: AtomicU64,
    /// Volume as f32 bits.
    volume_bits: AtomicU32,
    apply_basic_fx: AtomicBool,
    pub playing_details: Mutex<Option<PlayingDetails>>,
}

impl OutputShared {
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::SeqCst))
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.max(0.0).to_bits(), Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Enqueues a chunk on behalf of a writer that started at `epoch`.
    ///
    /// With `wait` the call polls until space frees up; the wait is
    /// cooperative and ends with [`Interrupted`] as soon as an abort is
    /// observed.
    pub fn write_at_epoch(
        &self,
        mut chunk: AudioChunk,
        wait: bool,
        epoch: u64,
    ) -> Result<bool, Interrupted> {
        loop {
            if self.clear_signal.load(Ordering::SeqCst)
                || self.abort_epoch.load(Ordering::SeqCst) != epoch
            {
                return Err(Interrupted);
            }
            match self.queue.try_push(chunk) {
                Ok(()) => return Ok(true),
                Err(rejected) => {
                    if !wait {
                        return Ok(false);
                    }
                    chunk = rejected;
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

/// A playback track: one open output stream, a bounded chunk queue, and a
/// background runner that feeds the device.
///
/// Construction opens the device and blocks until the runner is live; it
/// fails with [`MixerError::Device`] when the stream cannot be opened.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use track_mixer::{AudioChunk, MockBackend, OutputTrack};
///
/// let backend = Arc::new(MockBackend::new());
/// let track = OutputTrack::new("main", backend).unwrap();
///
/// let chunk = AudioChunk::new(vec![0.0; 1024], 44100, 2);
/// let queued = track.write(chunk, false).unwrap();
/// assert!(queued);
/// ```
pub struct OutputTrack {
    name: String,
    config: TrackConfig,
    callback: Option<OutputCallback>,
    conversion_dir: Option<PathBuf>,
    backend: Arc<dyn AudioBackend>,
    shared: Arc<OutputShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for OutputTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputTrack")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OutputTrack {
    /// Creates a track with default options and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::Device`] when the stream cannot be opened.
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn AudioBackend>,
    ) -> Result<Self, MixerError> {
        Self::with_options(name, OutputOptions::default(), backend)
    }

    /// Creates a track with the given options and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::Device`] when the stream cannot be opened.
    pub fn with_options(
        name: impl Into<String>,
        options: OutputOptions,
        backend: Arc<dyn AudioBackend>,
    ) -> Result<Self, MixerError> {
        let shared = Arc::new(OutputShared {
            lifecycle: LifecycleState::new(),
            queue: ChunkQueue::new(options.config.queue_capacity),
            playing: AtomicBool::new(false),
            clear_signal: AtomicBool::new(false),
            abort_epoch: AtomicU64::new(0),
            volume_bits: AtomicU32::new(options.volume.max(0.0).to_bits()),
            apply_basic_fx: AtomicBool::new(options.apply_basic_fx),
            playing_details: Mutex::new(None),
        });
        let track = Self {
            name: name.into(),
            config: options.config,
            callback: options.callback,
            conversion_dir: options.conversion_dir,
            backend,
            shared,
            handle: Mutex::new(None),
        };
        track.start()?;
        Ok(track)
    }

    /// Returns the track's name. Names are labels, not identifiers; they are
    /// not required to be unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the requested configuration.
    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    /// Returns the negotiated device format while running, `None` when
    /// stopped.
    pub fn device_spec(&self) -> Option<StreamSpec> {
        *self.shared.lifecycle.device_spec.lock()
    }

    /// Returns `true` when the runner is not live.
    pub fn is_stopped(&self) -> bool {
        self.shared.lifecycle.is_stopped()
    }

    /// Returns `true` while the runner is emitting queued audio.
    pub fn playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Returns the format of the material currently playing, `None` when
    /// idle.
    pub fn playing_details(&self) -> Option<PlayingDetails> {
        if self.playing() {
            *self.shared.playing_details.lock()
        } else {
            None
        }
    }

    /// Returns the current volume setting.
    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    /// Sets the volume. Takes effect on the next chunk the runner emits.
    ///
    /// Negative values clamp to zero.
    pub fn set_volume(&self, volume: f32) {
        self.shared.set_volume(volume);
    }

    /// Returns the number of chunks currently queued.
    pub fn queued_chunks(&self) -> usize {
        self.shared.queue.len()
    }

    /// Returns the conversion directory, if one was configured.
    pub fn conversion_dir(&self) -> Option<&Path> {
        self.conversion_dir.as_deref()
    }

    /// Starts the runner if the track is stopped.
    ///
    /// Blocks until the device stream is live. No-op on a running track.
    ///
    /// # Errors
    ///
    /// Returns a fault recorded by a previous runner, or
    /// [`MixerError::Device`] when the stream cannot be opened (the track
    /// stays stopped).
    pub fn start(&self) -> Result<(), MixerError> {
        let _guard = self.shared.lifecycle.start_guard.lock();
        if let Some(fault) = self.shared.lifecycle.take_fault() {
            return Err(fault);
        }
        if !self.shared.lifecycle.is_stopped() {
            return Ok(());
        }

        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }

        let shared = Arc::clone(&self.shared);
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let callback = self.callback.clone();
        let name = self.name.clone();

        let handle =
            std::thread::spawn(move || run_output(&backend, &config, callback, &name, &shared));
        *self.handle.lock() = Some(handle);

        let result = wait_started(&self.shared.lifecycle);
        if result.is_err() {
            if let Some(handle) = self.handle.lock().take() {
                let _ = handle.join();
            }
        }
        result
    }

    /// Aborts playback and stops the runner, closing the device stream.
    ///
    /// Suspends until the teardown is visible. Idempotent: stopping a
    /// stopped track is a no-op.
    ///
    /// # Errors
    ///
    /// Surfaces a fault recorded by the runner (callback panic or device
    /// failure mid-stream).
    pub async fn stop(&self) -> Result<(), MixerError> {
        self.abort().await;
        if !self.shared.lifecycle.is_stopped() {
            self.shared
                .lifecycle
                .stop_signal
                .store(true, Ordering::SeqCst);
            wait_stopped(&self.shared.lifecycle).await;
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        match self.shared.lifecycle.take_fault() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Drains pending playback without closing the device stream.
    ///
    /// Interrupts any in-flight playback writer, asks the runner to empty
    /// the queue, and suspends until `playing` is observably false. After
    /// `abort()` returns the queue is empty and no chunk of the aborted
    /// material will be emitted.
    ///
    /// `playing` reflects callback injection too: a callback that keeps
    /// injecting audio keeps the track playing, and `abort()` waits until
    /// the track actually falls silent.
    pub async fn abort(&self) {
        // Writers compare against the epoch, so even one that never sees the
        // transient clear signal stops producing.
        self.shared.abort_epoch.fetch_add(1, Ordering::SeqCst);

        if self.shared.lifecycle.is_stopped() {
            // No runner to acknowledge the signal; clear directly.
            self.shared.queue.clear();
            self.shared.playing.store(false, Ordering::SeqCst);
            self.shared.playing_details.lock().take();
            return;
        }

        if self.shared.is_playing() || !self.shared.queue.is_empty() {
            self.shared.clear_signal.store(true, Ordering::SeqCst);
            // A writer that was already past its epoch check can land one
            // more chunk after the runner's clear; wait for the queue to
            // drain as well so the abort is externally complete
            while self.shared.clear_signal.load(Ordering::SeqCst)
                || self.shared.is_playing()
                || !self.shared.queue.is_empty()
            {
                if self.shared.lifecycle.is_stopped() {
                    // Runner tore down while we waited; teardown cleared the
                    // queue and flags.
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    /// Enqueues a chunk for playback.
    ///
    /// With `wait` the call blocks until queue space is available. Without
    /// it, a full queue returns `Ok(false)` immediately - backpressure is a
    /// result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when an abort fires during the call. This is
    /// the expected way a producer learns to stop; the playback pipeline
    /// handles it internally.
    pub fn write(&self, chunk: AudioChunk, wait: bool) -> Result<bool, Interrupted> {
        let epoch = self.shared.abort_epoch.load(Ordering::SeqCst);
        self.shared.write_at_epoch(chunk, wait, epoch)
    }

    /// Decodes a file and plays it on this track.
    ///
    /// Whatever the track was playing is aborted first, so at most one
    /// producer ever feeds the queue. The decoded audio is channel-matched
    /// and resampled to the negotiated device format, split into
    /// `options.chunk_size`-frame pieces, and queued.
    ///
    /// With `options.blocking` the call returns once playback has finished;
    /// otherwise it returns as soon as playback audibly starts.
    ///
    /// # Errors
    ///
    /// [`MixerError::NotRunning`] when the track is stopped, decode and
    /// conversion errors from the file, [`MixerError::UnsupportedChannelLayout`]
    /// for layouts the matcher cannot replicate, and [`MixerError::Resample`]
    /// from the rate converter.
    pub async fn play_file(
        &self,
        path: impl AsRef<Path>,
        options: PlayOptions,
    ) -> Result<(), MixerError> {
        playback::play_file(self, path.as_ref(), options).await
    }

    pub(crate) fn shared(&self) -> Arc<OutputShared> {
        Arc::clone(&self.shared)
    }
}

impl Drop for OutputTrack {
    fn drop(&mut self) {
        // Best effort: ask the runner to wind down. An open stream handle is
        // a scarce resource, so prefer an explicit stop().
        if !self.shared.lifecycle.is_stopped() {
            self.shared
                .lifecycle
                .stop_signal
                .store(true, Ordering::SeqCst);
        }
    }
}

fn run_output(
    backend: &Arc<dyn AudioBackend>,
    config: &TrackConfig,
    callback: Option<OutputCallback>,
    name: &str,
    shared: &Arc<OutputShared>,
) {
    let mut stream = match backend.open_output(config) {
        Ok(stream) => stream,
        Err(err) => {
            *shared.lifecycle.start_error.lock() = Some(err);
            return;
        }
    };

    let spec = stream.spec();
    *shared.lifecycle.device_spec.lock() = Some(spec);
    shared.lifecycle.stopped.store(false, Ordering::SeqCst);
    tracing::debug!(
        track = name,
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "output runner started"
    );

    let info = TrackInfo {
        name: name.to_string(),
        config: config.clone(),
    };

    while !shared.lifecycle.stop_signal.load(Ordering::SeqCst) {
        // Acknowledge a pending abort before looking at the queue
        if shared.clear_signal.load(Ordering::SeqCst) {
            shared.queue.clear();
            shared.clear_signal.store(false, Ordering::SeqCst);
        }

        let mut data = shared.queue.try_pop();

        // The callback runs every cycle, present data or not, so it can
        // inject audio into silence or veto queued audio
        if let Some(cb) = &callback {
            let input = data.take();
            match catch_unwind(AssertUnwindSafe(|| cb(&info, input))) {
                Ok(result) => data = result,
                Err(payload) => {
                    let reason = panic_reason(payload);
                    tracing::error!(track = name, "output callback panicked: {reason}");
                    shared.lifecycle.record_fault(MixerError::TrackFailed {
                        name: name.to_string(),
                        reason,
                    });
                    break;
                }
            }
        }

        match data {
            Some(chunk) => {
                shared.playing.store(true, Ordering::SeqCst);
                let outgoing = if shared.apply_basic_fx.load(Ordering::SeqCst) {
                    effects::apply_volume(&chunk, shared.volume())
                } else {
                    chunk
                };
                if let Err(err) = stream.write(&outgoing) {
                    tracing::error!(track = name, "output write failed: {err}");
                    shared.lifecycle.record_fault(MixerError::TrackFailed {
                        name: name.to_string(),
                        reason: err.to_string(),
                    });
                    break;
                }
            }
            None => {
                // Empty queue plays as silence; the device callback keeps
                // running underneath
                if shared.playing.swap(false, Ordering::SeqCst) {
                    shared.playing_details.lock().take();
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }

    drop(stream);
    shared.queue.clear();
    shared.playing.store(false, Ordering::SeqCst);
    shared.clear_signal.store(false, Ordering::SeqCst);
    shared.playing_details.lock().take();
    *shared.lifecycle.device_spec.lock() = None;
    shared.lifecycle.stopped.store(true, Ordering::SeqCst);
    shared.lifecycle.stop_signal.store(false, Ordering::SeqCst);
    tracing::debug!(track = name, "output runner stopped");
}
