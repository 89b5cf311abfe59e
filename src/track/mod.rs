//! Capture and playback tracks.
//!
//! A track owns one open device stream and the background runner thread that
//! services it. Lifecycle calls from the application never touch the device
//! directly; they raise signal flags and cooperatively wait for the runner to
//! make the transition visible.

mod input;
mod output;

pub use input::{InputOptions, InputTrack};
pub use output::{OutputOptions, OutputTrack, PlayingDetails};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::StreamSpec;
use crate::{AudioChunk, MixerError, TrackConfig};

/// Cadence of the cooperative waits in `start`/`stop`/`abort` and of the
/// runner's idle cycle.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Read-only view of a track handed to user callbacks.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    /// The track's name.
    pub name: String,
    /// The track's requested configuration.
    pub config: TrackConfig,
}

/// Transform callback for capture tracks.
///
/// Invoked by the runner with each captured chunk and the overflow flag.
/// Returning `None` suppresses publication for that cycle.
pub type InputCallback = Arc<dyn Fn(&TrackInfo, AudioChunk, bool) -> Option<AudioChunk> + Send + Sync>;

/// Transform callback for playback tracks.
///
/// Invoked by the runner every cycle, even when the queue was empty, so the
/// application can inject audio or suppress what was queued. Returning `None`
/// plays silence for that cycle.
pub type OutputCallback =
    Arc<dyn Fn(&TrackInfo, Option<AudioChunk>) -> Option<AudioChunk> + Send + Sync>;

/// Lifecycle signals shared between a track handle and its runner thread.
pub(crate) struct LifecycleState {
    /// Serializes concurrent `start()` calls; the runner never takes this.
    pub start_guard: Mutex<()>,
    /// Caller requests the runner to shut down.
    pub stop_signal: AtomicBool,
    /// Runner reports that it is not running. Starts `true`.
    pub stopped: AtomicBool,
    /// Device open failure recorded by a runner that never started.
    pub start_error: Mutex<Option<MixerError>>,
    /// Abnormal termination recorded by a running runner; surfaced by the
    /// next lifecycle call.
    pub fault: Mutex<Option<MixerError>>,
    /// Negotiated device format while the stream is open.
    pub device_spec: Mutex<Option<StreamSpec>>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self {
            start_guard: Mutex::new(()),
            stop_signal: AtomicBool::new(false),
            stopped: AtomicBool::new(true),
            start_error: Mutex::new(None),
            fault: Mutex::new(None),
            device_spec: Mutex::new(None),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn take_fault(&self) -> Option<MixerError> {
        self.fault.lock().take()
    }

    pub fn record_fault(&self, err: MixerError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(err);
        }
    }
}

/// Blocks the calling thread until the runner reports Running, or returns
/// the open error it recorded.
pub(crate) fn wait_started(lifecycle: &LifecycleState) -> Result<(), MixerError> {
    loop {
        if let Some(err) = lifecycle.start_error.lock().take() {
            return Err(err);
        }
        if !lifecycle.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Suspends the calling task until the runner reports Stopped.
pub(crate) async fn wait_stopped(lifecycle: &LifecycleState) {
    while !lifecycle.stopped.load(Ordering::SeqCst) {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Converts a `catch_unwind` payload into a readable reason.
pub(crate) fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}
