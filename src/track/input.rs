//! Capture track.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::device::{AudioBackend, StreamSpec};
use crate::track::{
    panic_reason, wait_started, wait_stopped, InputCallback, LifecycleState, TrackInfo,
};
use crate::{AudioChunk, MixerError, TrackConfig};

/// Construction options for an [`InputTrack`].
#[derive(Default)]
pub struct InputOptions {
    /// Device parameters.
    pub config: TrackConfig,
    /// Optional transform callback run on every captured chunk.
    pub callback: Option<InputCallback>,
}

/// State shared between the track handle and its runner thread.
struct InputShared {
    lifecycle: LifecycleState,
    /// Single-slot mailbox with overwrite semantics: readers only ever see
    /// the most recent capture window. Fast readers observe duplicates, slow
    /// readers miss frames.
    last_chunk: Mutex<Option<AudioChunk>>,
    overflowed: AtomicBool,
}

/// A capture track: one open input stream plus a background runner that
/// publishes the most recent chunk.
///
/// Construction opens the device and blocks until the runner is live; it
/// fails with [`MixerError::Device`] when the stream cannot be opened.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use track_mixer::{InputTrack, MockBackend};
///
/// let backend = Arc::new(MockBackend::unpaced());
/// let track = InputTrack::new("mic", backend).unwrap();
///
/// // Most recent capture window, or None before the first cycle lands
/// let _latest = track.read();
/// ```
pub struct InputTrack {
    name: String,
    config: TrackConfig,
    callback: Option<InputCallback>,
    backend: Arc<dyn AudioBackend>,
    shared: Arc<InputShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for InputTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputTrack")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InputTrack {
    /// Creates a track with default options and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::Device`] when the stream cannot be opened.
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn AudioBackend>,
    ) -> Result<Self, MixerError> {
        Self::with_options(name, InputOptions::default(), backend)
    }

    /// Creates a track with the given options and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`MixerError::Device`] when the stream cannot be opened.
    pub fn with_options(
        name: impl Into<String>,
        options: InputOptions,
        backend: Arc<dyn AudioBackend>,
    ) -> Result<Self, MixerError> {
        let track = Self {
            name: name.into(),
            config: options.config,
            callback: options.callback,
            backend,
            shared: Arc::new(InputShared {
                lifecycle: LifecycleState::new(),
                last_chunk: Mutex::new(None),
                overflowed: AtomicBool::new(false),
            }),
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

    /// Returns `true` when the last capture cycle lost samples.
    pub fn overflowed(&self) -> bool {
        self.shared.overflowed.load(Ordering::SeqCst)
    }

    /// Returns the most recent captured chunk, or `None` when nothing has
    /// been published yet.
    ///
    /// Repeated calls between capture cycles return the same chunk.
    pub fn read(&self) -> Option<AudioChunk> {
        self.shared.last_chunk.lock().clone()
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

        // Reap the previous runner thread, if any
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }

        let shared = Arc::clone(&self.shared);
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let callback = self.callback.clone();
        let name = self.name.clone();

        let handle = std::thread::spawn(move || run_input(&backend, &config, callback, &name, &shared));
        *self.handle.lock() = Some(handle);

        let result = wait_started(&self.shared.lifecycle);
        if result.is_err() {
            if let Some(handle) = self.handle.lock().take() {
                let _ = handle.join();
            }
        }
        result
    }

    /// Stops the runner and closes the device stream.
    ///
    /// Suspends until the teardown is visible. Idempotent: stopping a
    /// stopped track is a no-op.
    ///
    /// # Errors
    ///
    /// Surfaces a fault recorded by the runner (callback panic or device
    /// failure mid-stream).
    pub async fn stop(&self) -> Result<(), MixerError> {
        if !self.shared.lifecycle.is_stopped() {
            self.shared.lifecycle.stop_signal.store(true, Ordering::SeqCst);
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
}

impl Drop for InputTrack {
    fn drop(&mut self) {
        // Best effort: ask the runner to wind down. An open stream handle is
        // a scarce resource, so prefer an explicit stop().
        if !self.shared.lifecycle.is_stopped() {
            self.shared.lifecycle.stop_signal.store(true, Ordering::SeqCst);
        }
    }
}

fn run_input(
    backend: &Arc<dyn AudioBackend>,
    config: &TrackConfig,
    callback: Option<InputCallback>,
    name: &str,
    shared: &Arc<InputShared>,
) {
    let mut stream = match backend.open_input(config) {
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
        "input runner started"
    );

    let info = TrackInfo {
        name: name.to_string(),
        config: config.clone(),
    };

    while !shared.lifecycle.stop_signal.load(Ordering::SeqCst) {
        let (chunk, overflow) = match stream.read(config.chunk_size) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(track = name, "input read failed: {err}");
                shared.lifecycle.record_fault(MixerError::TrackFailed {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
                break;
            }
        };

        if overflow {
            tracing::warn!(track = name, "input overflow: samples were lost");
        }
        shared.overflowed.store(overflow, Ordering::SeqCst);

        let published = match &callback {
            Some(cb) => match catch_unwind(AssertUnwindSafe(|| cb(&info, chunk, overflow))) {
                Ok(result) => result,
                Err(payload) => {
                    let reason = panic_reason(payload);
                    tracing::error!(track = name, "input callback panicked: {reason}");
                    shared.lifecycle.record_fault(MixerError::TrackFailed {
                        name: name.to_string(),
                        reason,
                    });
                    break;
                }
            },
            None => Some(chunk),
        };

        // None from the callback suppresses publication for this cycle
        if let Some(chunk) = published {
            *shared.last_chunk.lock() = Some(chunk);
        }
    }

    drop(stream);
    *shared.last_chunk.lock() = None;
    *shared.lifecycle.device_spec.lock() = None;
    shared.overflowed.store(false, Ordering::SeqCst);
    shared.lifecycle.stopped.store(true, Ordering::SeqCst);
    shared.lifecycle.stop_signal.store(false, Ordering::SeqCst);
    tracing::debug!(track = name, "input runner stopped");
}
