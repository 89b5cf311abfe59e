//! Integration tests for track-mixer.
//!
//! Everything runs against [`MockBackend`], which paces I/O to wall-clock
//! time, so the full track lifecycle is exercised without audio hardware.
//! Tests that need a real device are marked `#[ignore]`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use track_mixer::{
    AudioChunk, InputOptions, InputTrack, MixerError, MockBackend, Mixer, OutputOptions,
    OutputTrack, PlayOptions, Track, TrackConfig,
};

/// Writes a stereo 44.1kHz float WAV filled with a constant sample value.
///
/// Constant fill plus a rate that matches the track keeps playback
/// byte-identical to the file, so emitted chunks can be attributed to their
/// source.
fn write_constant_wav(path: &Path, value: f32, seconds: f64) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (44100.0 * seconds) as usize;
    for _ in 0..frames {
        writer.write_sample(value).unwrap();
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

fn fixture(dir: &tempfile::TempDir, name: &str, value: f32, seconds: f64) -> PathBuf {
    let path = dir.path().join(name);
    write_constant_wav(&path, value, seconds);
    path
}

async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}

// ==================== Scenario A: construct then stop ====================

#[tokio::test]
async fn test_output_track_construct_then_stop() {
    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();

    // Construction blocks until the stream is live
    assert!(!track.is_stopped());
    assert!(track.device_spec().is_some());

    track.stop().await.unwrap();
    assert!(track.is_stopped());
    assert!(track.device_spec().is_none());
    assert_eq!(track.queued_chunks(), 0);
}

#[tokio::test]
async fn test_output_track_stop_start_cycles() {
    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();

    for _ in 0..4 {
        track.stop().await.unwrap();
        assert!(track.is_stopped());
        track.start().unwrap();
        assert!(!track.is_stopped());
    }

    track.stop().await.unwrap();
}

#[tokio::test]
async fn test_device_open_failure() {
    let backend = Arc::new(MockBackend::failing());
    let err = OutputTrack::new("Track 0", backend).unwrap_err();
    assert!(matches!(err, MixerError::Device { .. }));
}

// ==================== Scenario B: queue backpressure ====================

#[tokio::test]
async fn test_queue_backpressure_results() {
    let options = OutputOptions {
        config: TrackConfig {
            queue_capacity: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::with_options("Track 0", options, backend).unwrap();
    // Stopping parks the consumer so the queue state is deterministic; the
    // queue itself survives until the next teardown
    track.stop().await.unwrap();

    let chunk = |v: f32| AudioChunk::new(vec![v; 1024], 44100, 2);

    // Three non-blocking writes against capacity 2: [true, true, false]
    assert!(track.write(chunk(0.1), false).unwrap());
    assert!(track.write(chunk(0.2), false).unwrap());
    assert!(!track.write(chunk(0.3), false).unwrap());
    assert_eq!(track.queued_chunks(), 2);

    // Restarting lets the runner pop the two queued chunks
    track.start().unwrap();
    assert!(wait_for(|| track.queued_chunks() == 0, Duration::from_secs(2)).await);

    // With the queue drained, a fourth write succeeds
    assert!(track.write(chunk(0.4), false).unwrap());

    track.stop().await.unwrap();
}

// ==================== Abort semantics ====================

#[tokio::test]
async fn test_abort_makes_playing_false_and_empties_queue() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "long.wav", 0.25, 1.0);

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();

    track.play_file(&file, PlayOptions::default()).await.unwrap();
    assert!(track.playing());
    assert!(track.playing_details().is_some());

    track.abort().await;
    assert!(!track.playing());
    assert_eq!(track.queued_chunks(), 0);
    assert!(track.playing_details().is_none());

    // The stream is still open; the track can play again
    assert!(!track.is_stopped());
    track.stop().await.unwrap();
}

#[tokio::test]
async fn test_new_playback_never_interleaves_with_old() {
    let dir = tempfile::tempdir().unwrap();
    let first = fixture(&dir, "first.wav", 0.25, 0.4);
    let second = fixture(&dir, "second.wav", 0.5, 0.2);

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend.clone()).unwrap();

    track.play_file(&first, PlayOptions::default()).await.unwrap();
    assert!(track.playing());

    // Give the runner time to emit a few chunks of the first file
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second playback aborts the first before filling the queue
    let blocking = PlayOptions {
        blocking: true,
        ..Default::default()
    };
    track.play_file(&second, blocking).await.unwrap();
    track.stop().await.unwrap();

    let written = backend.written();
    assert!(!written.is_empty());

    let value_of = |chunk: &AudioChunk| chunk.samples[0];
    let first_new = written
        .iter()
        .position(|c| (value_of(c) - 0.5).abs() < 1e-6)
        .expect("second file should have been emitted");

    // No chunk of the aborted file appears after the new fill begins
    for chunk in &written[first_new..] {
        assert!(
            (value_of(chunk) - 0.5).abs() < 1e-6,
            "old chunk emitted after new playback began"
        );
    }
    // And the first file did get some airtime before the switch
    assert!(written[..first_new]
        .iter()
        .all(|c| (value_of(c) - 0.25).abs() < 1e-6));
}

#[tokio::test]
async fn test_repeated_play_file_on_same_track() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "cue.wav", 0.25, 0.5);

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();

    for _ in 0..4 {
        track.play_file(&file, PlayOptions::default()).await.unwrap();
        assert!(track.playing());
    }

    track.abort().await;
    assert!(!track.playing());
    track.stop().await.unwrap();
}

// ==================== Scenario C: mixer allocation ====================

#[tokio::test]
async fn test_mixer_play_file_allocation() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "cue.wav", 0.25, 0.5);

    let backend = Arc::new(MockBackend::new());
    let mixer = Mixer::new(vec![
        Track::Output(OutputTrack::new("o1", backend.clone()).unwrap()),
        Track::Output(OutputTrack::new("o2", backend.clone()).unwrap()),
        Track::Input(InputTrack::new("i1", backend.clone()).unwrap()),
        Track::Input(InputTrack::new("i2", backend.clone()).unwrap()),
    ]);

    assert_eq!(mixer.tracks().len(), 4);
    assert_eq!(mixer.input_tracks().count(), 2);
    assert_eq!(mixer.output_tracks().count(), 2);
    assert_eq!(mixer.available_output_tracks().count(), 2);

    // Two idle tracks serve the first two requests; the third gets none
    let t1 = mixer.play_file(&file, PlayOptions::default()).await.unwrap();
    let t1_name = t1.expect("first call should get a track").name().to_string();
    let t2 = mixer.play_file(&file, PlayOptions::default()).await.unwrap();
    let t2_name = t2.expect("second call should get a track").name().to_string();

    assert_ne!(t1_name, t2_name);
    assert!(["o1", "o2"].contains(&t1_name.as_str()));
    assert!(["o1", "o2"].contains(&t2_name.as_str()));
    assert_eq!(mixer.available_output_tracks().count(), 0);

    let t3 = mixer.play_file(&file, PlayOptions::default()).await.unwrap();
    assert!(t3.is_none());

    // Aborting frees the tracks without closing their streams
    mixer.abort_outputs().await;
    for track in mixer.tracks() {
        assert!(!track.is_stopped());
    }
    assert_eq!(mixer.available_output_tracks().count(), 2);

    mixer.stop_inputs().await.unwrap();
    mixer.stop_outputs().await.unwrap();
    for track in mixer.tracks() {
        assert!(track.is_stopped());
    }
}

// ==================== Scenario D: capture-to-playback pipe ====================

#[tokio::test]
async fn test_pipe_input_to_output_respects_capacity() {
    let backend = Arc::new(MockBackend::new());

    let input = InputTrack::with_options(
        "mic",
        InputOptions {
            config: TrackConfig {
                chunk_size: 512,
                ..Default::default()
            },
            callback: None,
        },
        backend.clone(),
    )
    .unwrap();

    let capacity = 4;
    let output = OutputTrack::with_options(
        "speaker",
        OutputOptions {
            config: TrackConfig {
                chunk_size: 512,
                queue_capacity: capacity,
                ..Default::default()
            },
            ..Default::default()
        },
        backend.clone(),
    )
    .unwrap();

    for _ in 0..30 {
        if let Some(chunk) = input.read() {
            // Non-blocking write: a full queue reports false, it never grows
            let _ = output.write(chunk, false).unwrap();
        }
        assert!(output.queued_chunks() <= capacity);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    input.stop().await.unwrap();
    output.stop().await.unwrap();
}

// ==================== Playback details and errors ====================

#[tokio::test]
async fn test_playing_details_reflect_material() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "cue.wav", 0.25, 0.5);

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();

    assert!(track.playing_details().is_none());

    track.play_file(&file, PlayOptions::default()).await.unwrap();
    let details = track.playing_details().expect("details while playing");
    assert_eq!(details.sample_rate, 44100);
    assert_eq!(details.channels, 2);

    track.stop().await.unwrap();
    assert!(track.playing_details().is_none());
}

#[tokio::test]
async fn test_play_file_on_stopped_track_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "cue.wav", 0.25, 0.1);

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();
    track.stop().await.unwrap();

    let err = track
        .play_file(&file, PlayOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MixerError::NotRunning { .. }));
}

#[tokio::test]
async fn test_play_file_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.xyz");
    std::fs::write(&path, b"not audio").unwrap();

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend).unwrap();

    let err = track
        .play_file(&path, PlayOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MixerError::UnsupportedFormat { .. }));

    // A failed playback leaves the track usable
    assert!(!track.is_stopped());
    track.stop().await.unwrap();
}

#[tokio::test]
async fn test_blocking_play_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "short.wav", 0.25, 0.1);

    let backend = Arc::new(MockBackend::new());
    let track = OutputTrack::new("Track 0", backend.clone()).unwrap();

    let options = PlayOptions {
        blocking: true,
        ..Default::default()
    };
    track.play_file(&file, options).await.unwrap();

    // Playback already finished when a blocking call returns
    assert!(!track.playing());
    assert_eq!(track.queued_chunks(), 0);
    // 0.1s at 44100 in 512-frame chunks
    assert_eq!(backend.written().len(), 9);

    track.stop().await.unwrap();
}

#[tokio::test]
async fn test_volume_applies_to_emitted_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "short.wav", 0.5, 0.1);

    let backend = Arc::new(MockBackend::new());
    let options = OutputOptions {
        volume: 0.5,
        ..Default::default()
    };
    let track = OutputTrack::with_options("Track 0", options, backend.clone()).unwrap();

    let blocking = PlayOptions {
        blocking: true,
        ..Default::default()
    };
    track.play_file(&file, blocking).await.unwrap();
    track.stop().await.unwrap();

    let written = backend.written();
    assert!(!written.is_empty());
    let gain = track_mixer::effects::volume_gain(0.5);
    for chunk in &written {
        assert!((chunk.samples[0] - 0.5 * gain).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_input_read_is_last_write_wins() {
    let backend = Arc::new(MockBackend::new());
    let input = InputTrack::new("mic", backend).unwrap();

    assert!(wait_for(|| input.read().is_some(), Duration::from_secs(2)).await);

    // Two quick reads can observe the same window; that is by design
    let a = input.read().unwrap();
    let b = input.read().unwrap();
    assert_eq!(a.frame_count(), b.frame_count());

    input.stop().await.unwrap();
}
