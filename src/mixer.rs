//! Track collection and playback routing.

use std::path::Path;

use crate::playback::PlayOptions;
use crate::track::{InputTrack, OutputTrack};
use crate::MixerError;

/// A registered track, tagged by capability.
///
/// The mixer partitions its collection by this tag, not by track identity:
/// every track is reachable through exactly one of `input_tracks()` and
/// `output_tracks()`.
pub enum Track {
    /// A capture track.
    Input(InputTrack),
    /// A playback track.
    Output(OutputTrack),
}

impl Track {
    /// Returns the track's name.
    pub fn name(&self) -> &str {
        match self {
            Track::Input(track) => track.name(),
            Track::Output(track) => track.name(),
        }
    }

    /// Returns `true` when the track's runner is not live.
    pub fn is_stopped(&self) -> bool {
        match self {
            Track::Input(track) => track.is_stopped(),
            Track::Output(track) => track.is_stopped(),
        }
    }
}

/// A collection of tracks with aggregate lifecycle operations and
/// output-track allocation for file playback.
///
/// The mixer does not open or close device streams itself; each track owns
/// its stream exclusively and the mixer delegates to it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use track_mixer::{InputTrack, MockBackend, Mixer, OutputTrack, Track};
///
/// let backend = Arc::new(MockBackend::new());
/// let mixer = Mixer::new(vec![
///     Track::Output(OutputTrack::new("o1", backend.clone()).unwrap()),
///     Track::Input(InputTrack::new("i1", backend.clone()).unwrap()),
/// ]);
///
/// assert_eq!(mixer.tracks().len(), 2);
/// assert_eq!(mixer.output_tracks().count(), 1);
/// ```
pub struct Mixer {
    tracks: Vec<Track>,
}

impl Mixer {
    /// Creates a mixer over the given tracks. Registration order is
    /// preserved and determines playback allocation order.
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Returns all registered tracks in registration order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Returns the capture tracks in registration order.
    pub fn input_tracks(&self) -> impl Iterator<Item = &InputTrack> {
        self.tracks.iter().filter_map(|track| match track {
            Track::Input(input) => Some(input),
            Track::Output(_) => None,
        })
    }

    /// Returns the playback tracks in registration order.
    pub fn output_tracks(&self) -> impl Iterator<Item = &OutputTrack> {
        self.tracks.iter().filter_map(|track| match track {
            Track::Output(output) => Some(output),
            Track::Input(_) => None,
        })
    }

    /// Returns the playback tracks that are not currently playing.
    pub fn available_output_tracks(&self) -> impl Iterator<Item = &OutputTrack> {
        self.output_tracks().filter(|track| !track.playing())
    }

    /// Plays a file on the first available output track.
    ///
    /// Returns the chosen track, or `Ok(None)` when every output track is
    /// busy - callers are expected to check, this is not an error.
    ///
    /// # Errors
    ///
    /// Propagates decode, channel-layout, and resample failures from the
    /// chosen track's pipeline.
    pub async fn play_file(
        &self,
        path: impl AsRef<Path>,
        options: PlayOptions,
    ) -> Result<Option<&OutputTrack>, MixerError> {
        let Some(track) = self.available_output_tracks().next() else {
            return Ok(None);
        };
        track.play_file(path, options).await?;
        Ok(Some(track))
    }

    /// Stops every capture track.
    ///
    /// Attempts all tracks even when one fails; failures are collected into
    /// [`MixerError::Aggregate`].
    pub async fn stop_inputs(&self) -> Result<(), MixerError> {
        let mut errors = Vec::new();
        for track in self.input_tracks() {
            if let Err(err) = track.stop().await {
                tracing::error!(track = track.name(), "stop failed: {err}");
                errors.push(err);
            }
        }
        collect(errors)
    }

    /// Stops every playback track.
    ///
    /// Attempts all tracks even when one fails; failures are collected into
    /// [`MixerError::Aggregate`].
    pub async fn stop_outputs(&self) -> Result<(), MixerError> {
        let mut errors = Vec::new();
        for track in self.output_tracks() {
            if let Err(err) = track.stop().await {
                tracing::error!(track = track.name(), "stop failed: {err}");
                errors.push(err);
            }
        }
        collect(errors)
    }

    /// Aborts playback on every output track without closing their streams.
    pub async fn abort_outputs(&self) {
        for track in self.output_tracks() {
            track.abort().await;
        }
    }
}

fn collect(errors: Vec<MixerError>) -> Result<(), MixerError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(MixerError::Aggregate { errors })
    }
}
