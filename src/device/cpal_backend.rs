//! CPAL implementation of the audio backend.
//!
//! CPAL delivers audio through callbacks on its own thread, while tracks
//! expect blocking read/write primitives. A lock-free SPSC ring buffer
//! bridges the two: the callback pushes (capture) or pops (playback) samples
//! and the blocking side polls the other end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::device::{AudioBackend, InputStream, OutputStream, StreamSpec};
use crate::format::convert::{f32_to_i16, i16_to_f32};
use crate::{AudioChunk, MixerError, TrackConfig};

/// Ring capacity in chunks; absorbs jitter between the callback cadence and
/// the runner's cycle.
const RING_CHUNKS: usize = 8;

/// Poll interval while waiting on the ring.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

fn device_error(e: impl std::fmt::Display) -> MixerError {
    MixerError::Device {
        reason: e.to_string(),
    }
}

/// Audio backend backed by the system's default CPAL host.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    /// Creates a backend using the default host and default devices.
    pub fn new() -> Self {
        Self
    }

    fn default_input_device() -> Result<Device, MixerError> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| device_error("no default input device"))
    }

    fn default_output_device() -> Result<Device, MixerError> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| device_error("no default output device"))
    }
}

fn requested_config(config: &TrackConfig) -> CpalStreamConfig {
    CpalStreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

fn ring_capacity(config: &TrackConfig, channels: u16) -> usize {
    config.chunk_size.max(1) * channels.max(1) as usize * RING_CHUNKS
}

impl AudioBackend for CpalBackend {
    fn open_input(&self, config: &TrackConfig) -> Result<Box<dyn InputStream>, MixerError> {
        let device = Self::default_input_device()?;
        let supported = device.default_input_config().map_err(device_error)?;
        let sample_format = supported.sample_format();

        // Try the requested parameters first; fall back to the device's
        // default shape when the hardware rejects them.
        let requested = requested_config(config);
        let (stream, consumer, overflowed, used) =
            match build_input(&device, &requested, sample_format, config) {
                Ok(parts) => (parts.0, parts.1, parts.2, requested),
                Err(first_err) => {
                    let fallback: CpalStreamConfig = supported.into();
                    let parts = build_input(&device, &fallback, sample_format, config)
                        .map_err(|_| first_err)?;
                    (parts.0, parts.1, parts.2, fallback)
                }
            };

        stream.play().map_err(device_error)?;

        Ok(Box::new(CpalInputStream {
            _stream: stream,
            consumer,
            overflowed,
            spec: StreamSpec {
                sample_rate: used.sample_rate.0,
                channels: used.channels,
            },
        }))
    }

    fn open_output(&self, config: &TrackConfig) -> Result<Box<dyn OutputStream>, MixerError> {
        let device = Self::default_output_device()?;
        let supported = device.default_output_config().map_err(device_error)?;
        let sample_format = supported.sample_format();

        let requested = requested_config(config);
        let (stream, producer, used) = match build_output(&device, &requested, sample_format, config)
        {
            Ok(parts) => (parts.0, parts.1, requested),
            Err(first_err) => {
                let fallback: CpalStreamConfig = supported.into();
                let parts =
                    build_output(&device, &fallback, sample_format, config).map_err(|_| first_err)?;
                (parts.0, parts.1, fallback)
            }
        };

        stream.play().map_err(device_error)?;

        Ok(Box::new(CpalOutputStream {
            _stream: stream,
            producer,
            spec: StreamSpec {
                sample_rate: used.sample_rate.0,
                channels: used.channels,
            },
        }))
    }
}

type InputParts = (Stream, HeapCons<f32>, Arc<AtomicBool>);

fn build_input(
    device: &Device,
    cpal_config: &CpalStreamConfig,
    sample_format: SampleFormat,
    config: &TrackConfig,
) -> Result<InputParts, MixerError> {
    let ring = HeapRb::<f32>::new(ring_capacity(config, cpal_config.channels));
    let (mut producer, consumer) = ring.split();
    let overflowed = Arc::new(AtomicBool::new(false));
    let overflow_flag = Arc::clone(&overflowed);

    let err_fn = |err| {
        tracing::error!("audio input stream error: {err}");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_input_stream(
                cpal_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let pushed = producer.push_slice(data);
                    if pushed < data.len() {
                        overflow_flag.store(true, Ordering::SeqCst);
                    }
                },
                err_fn,
                None,
            )
            .map_err(device_error)?,
        SampleFormat::I16 => device
            .build_input_stream(
                cpal_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        if producer.try_push(i16_to_f32(sample)).is_err() {
                            overflow_flag.store(true, Ordering::SeqCst);
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(device_error)?,
        format => {
            return Err(device_error(format!("unsupported sample format: {format:?}")));
        }
    };

    Ok((stream, consumer, overflowed))
}

type OutputParts = (Stream, HeapProd<f32>);

fn build_output(
    device: &Device,
    cpal_config: &CpalStreamConfig,
    sample_format: SampleFormat,
    config: &TrackConfig,
) -> Result<OutputParts, MixerError> {
    let ring = HeapRb::<f32>::new(ring_capacity(config, cpal_config.channels));
    let (producer, mut consumer) = ring.split();

    let err_fn = |err| {
        tracing::error!("audio output stream error: {err}");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Underrun plays silence rather than stale samples
                    for slot in data.iter_mut() {
                        *slot = consumer.try_pop().unwrap_or(0.0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(device_error)?,
        SampleFormat::I16 => device
            .build_output_stream(
                cpal_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for slot in data.iter_mut() {
                        *slot = consumer.try_pop().map(f32_to_i16).unwrap_or(0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(device_error)?,
        format => {
            return Err(device_error(format!("unsupported sample format: {format:?}")));
        }
    };

    Ok((stream, producer))
}

/// Capture stream bridged from the CPAL callback through a ring buffer.
struct CpalInputStream {
    /// Keeps the CPAL stream alive; dropping it stops capture.
    _stream: Stream,
    consumer: HeapCons<f32>,
    overflowed: Arc<AtomicBool>,
    spec: StreamSpec,
}

impl InputStream for CpalInputStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read(&mut self, frames: usize) -> Result<(AudioChunk, bool), MixerError> {
        let needed = frames * self.spec.channels.max(1) as usize;
        while self.consumer.occupied_len() < needed {
            thread::sleep(POLL_INTERVAL);
        }

        let mut samples = Vec::with_capacity(needed);
        for _ in 0..needed {
            match self.consumer.try_pop() {
                Some(sample) => samples.push(sample),
                None => break,
            }
        }

        let overflow = self.overflowed.swap(false, Ordering::SeqCst);
        Ok((
            AudioChunk::new(samples, self.spec.sample_rate, self.spec.channels),
            overflow,
        ))
    }
}

/// Playback stream bridged to the CPAL callback through a ring buffer.
struct CpalOutputStream {
    /// Keeps the CPAL stream alive; dropping it stops playback.
    _stream: Stream,
    producer: HeapProd<f32>,
    spec: StreamSpec,
}

impl OutputStream for CpalOutputStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn write(&mut self, chunk: &AudioChunk) -> Result<(), MixerError> {
        let samples: &[f32] = &chunk.samples;
        let mut offset = 0;
        while offset < samples.len() {
            offset += self.producer.push_slice(&samples[offset..]);
            if offset < samples.len() {
                thread::sleep(POLL_INTERVAL);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_capacity_scales_with_channels() {
        let config = TrackConfig::default();
        assert_eq!(ring_capacity(&config, 2), 512 * 2 * RING_CHUNKS);
        assert_eq!(ring_capacity(&config, 1), 512 * RING_CHUNKS);
    }

    // Note: device tests require actual audio hardware and are skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_open_default_output() {
        let backend = CpalBackend::new();
        let stream = backend.open_output(&TrackConfig::default()).unwrap();
        println!("negotiated: {:?}", stream.spec());
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_open_default_input() {
        let backend = CpalBackend::new();
        let stream = backend.open_input(&TrackConfig::default()).unwrap();
        println!("negotiated: {:?}", stream.spec());
    }
}
