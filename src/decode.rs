//! File decoding for playback.
//!
//! Decoding goes through symphonia, probing the container from the file
//! extension plus content and decoding the default track to interleaved f32.
//! When a conversion directory is configured and symphonia cannot handle the
//! format, the fallback shells out to `ffmpeg` to produce a WAV copy in that
//! directory and retries the decode once.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::MixerError;

/// A fully decoded audio file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved f32 samples, frames-major.
    pub samples: Vec<f32>,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Source channel count.
    pub channels: u16,
}

fn unsupported(path: &Path, reason: impl std::fmt::Display) -> MixerError {
    MixerError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Decodes an audio file entirely into memory.
///
/// The whole file is held in memory until playback finishes, so this is
/// intended for effects and music cues rather than hour-long material.
///
/// # Errors
///
/// [`MixerError::Io`] when the file cannot be opened,
/// [`MixerError::UnsupportedFormat`] when probing or decoding fails.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, MixerError> {
    let file = File::open(path).map_err(|e| MixerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported(path, e))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| unsupported(path, "no default audio track"))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported(path, e))?;

    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unsupported(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                // Recoverable corruption; skip the packet
                tracing::warn!(path = %path.display(), "decode error (continuing): {e}");
                continue;
            }
            Err(e) => return Err(unsupported(path, e)),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
            channels = spec.channels.count() as u16;
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(unsupported(path, "no audio frames decoded"));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decodes a file, converting through `ffmpeg` once when direct decode fails.
///
/// With `conversion_dir` set, an [`MixerError::UnsupportedFormat`] from the
/// direct decode triggers one transcode to `<conversion_dir>/<stem>.wav`
/// followed by a retry against that file. Without a conversion directory the
/// original error propagates.
pub fn decode_with_fallback(
    path: &Path,
    conversion_dir: Option<&Path>,
) -> Result<DecodedAudio, MixerError> {
    match decode_file(path) {
        Ok(decoded) => Ok(decoded),
        Err(err @ MixerError::UnsupportedFormat { .. }) => {
            let Some(dir) = conversion_dir else {
                return Err(err);
            };
            tracing::debug!(
                path = %path.display(),
                "direct decode failed, converting through ffmpeg"
            );
            let converted = convert_to_wav(path, dir)?;
            decode_file(&converted)
        }
        Err(err) => Err(err),
    }
}

/// Transcodes `path` to a WAV file inside `dir` using the `ffmpeg` CLI.
fn convert_to_wav(path: &Path, dir: &Path) -> Result<PathBuf, MixerError> {
    std::fs::create_dir_all(dir).map_err(|e| MixerError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MixerError::Conversion {
            path: path.to_path_buf(),
            reason: "path has no file stem".to_string(),
        })?;
    let out = dir.join(format!("{stem}.wav"));

    let status = Command::new("ffmpeg")
        .args(["-loglevel", "quiet", "-y", "-i"])
        .arg(path)
        .arg(&out)
        .status()
        .map_err(|e| MixerError::Conversion {
            path: path.to_path_buf(),
            reason: format!("failed to run ffmpeg: {e}"),
        })?;

    if !status.success() {
        return Err(MixerError::Conversion {
            path: path.to_path_buf(),
            reason: format!("ffmpeg exited with {status}"),
        });
    }

    Ok(out)
}
