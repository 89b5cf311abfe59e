//! # track-mixer
//!
//! A software audio mixer built around capture and playback tracks.
//!
//! Each [`InputTrack`] or [`OutputTrack`] owns one open device stream and a
//! dedicated background runner thread. Playback is decoupled from producers
//! through a bounded chunk queue with explicit backpressure; capture publishes
//! into a single-slot last-read holder. A [`Mixer`] groups tracks and
//! multiplexes file playback across whichever output tracks are idle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use track_mixer::{CpalBackend, Mixer, OutputTrack, PlayOptions, Track};
//!
//! let backend = Arc::new(CpalBackend::new());
//! let o1 = OutputTrack::new("o1", backend.clone())?;
//! let o2 = OutputTrack::new("o2", backend.clone())?;
//!
//! let mixer = Mixer::new(vec![Track::Output(o1), Track::Output(o2)]);
//!
//! // Plays on the first idle output track; `Ok(None)` when all are busy.
//! let chosen = mixer.play_file("intro.wav", PlayOptions::default()).await?;
//!
//! mixer.stop_outputs().await?;
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Runner thread** (one per track): the only context that touches the
//!   blocking device read/write primitives
//! - **Chunk queue**: bounded FIFO between playback producers and the runner;
//!   a full queue rejects or delays writes, it never drops audio silently
//! - **Caller context**: lifecycle calls (`stop`, `abort`, `play_file`)
//!   cooperatively poll until the requested transition is visible
//!
//! Aborting playback is a signal, not a direct queue mutation: the runner
//! drains its own queue on the next cycle and in-flight writers stop
//! producing, so the hardware-facing side never blocks on a caller.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]

mod chunk;
mod config;
pub mod decode;
pub mod device;
pub mod effects;
mod error;
pub mod format;
mod mixer;
mod playback;
mod queue;
mod track;

pub use chunk::AudioChunk;
pub use config::TrackConfig;
pub use device::{AudioBackend, CpalBackend, InputStream, MockBackend, OutputStream, StreamSpec};
pub use error::{Interrupted, MixerError};
pub use mixer::{Mixer, Track};
pub use playback::PlayOptions;
pub use track::{
    InputCallback, InputOptions, InputTrack, OutputCallback, OutputOptions, OutputTrack,
    PlayingDetails, TrackInfo,
};
