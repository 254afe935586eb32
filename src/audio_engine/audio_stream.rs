//! Audio Stream Module
//!
//! This module handles CPAL audio stream management including:
//! - Output stream setup and the real-time render callback
//! - Microphone input capture into a lock-free sample ring, converted to the output rate
//! - Raw input recording into an optional WAV writer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use env_logger::{Builder, Env};
use hound::WavWriter;
use rtrb::{Consumer, Producer, RingBuffer};
use std::fs::File;
use std::io::BufWriter;
use std::sync::{Arc, Mutex};

use crate::audio_engine::analysis::SharedAmplitude;
use crate::audio_engine::channels::mono_frames;
use crate::audio_engine::constants::{MESSAGE_RING_CAPACITY, MIC_RING_CAPACITY};
use crate::audio_engine::errors::EngineError;
use crate::audio_engine::mixer::RtMixer;
use crate::audio_engine::resample::StreamResampler;
use crate::messages::{AudioMessage, ControlMessage};

/// WAV writer shared between the control side and the input callback.
pub type RecordingSink = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Handle to the audio streams and the event channel out of the callback
pub struct AudioStreamHandle {
    pub output_stream: Stream,
    pub input_stream: Option<Stream>,
    pub consumer: Consumer<AudioMessage>,
    pub output_sample_rate: u32,
    pub input_channels: u16,
    pub input_sample_rate: u32,
}

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Default to `info`; override via `RUST_LOG`, e.g. `RUST_LOG=debug` when troubleshooting.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

/// Create and configure the audio streams
///
/// This function:
/// 1. Opens the default output device and builds the render callback
/// 2. Opens the default input device, if any, feeding the mic ring and the recording sink
/// 3. Creates ring buffers for message passing
///
/// The streams are returned paused together with the control producer; see [`start_stream`].
pub fn create_audio_stream(
    buffer_frames: u32,
    amplitude: SharedAmplitude,
    recording: RecordingSink,
) -> Result<(AudioStreamHandle, Producer<ControlMessage>), EngineError> {
    setup_logger();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(EngineError::NoDevice("output"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate();
    let channels = config.channels();

    log::info!(
        "Starting AudioEngine... ({} ch@{} Hz)",
        channels,
        sample_rate
    );

    // Control messages into the callback
    let (producer_in, mut consumer_in) = RingBuffer::new(MESSAGE_RING_CAPACITY);

    // Events out of the callback
    let (mut producer_out, consumer_out) = RingBuffer::new(MESSAGE_RING_CAPACITY);

    // Mono microphone samples from the input callback
    let (mic_producer, mut mic_consumer) = RingBuffer::<f32>::new(MIC_RING_CAPACITY);

    let mut mixer = RtMixer::new(channels as usize, sample_rate);
    let mut mic_block = vec![0.0f32; MIC_RING_CAPACITY];

    let stream_config = StreamConfig {
        channels,
        sample_rate,
        buffer_size: BufferSize::Fixed(buffer_frames),
    };

    let output_stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            while let Ok(message) = consumer_in.pop() {
                if let Some(reply) = mixer.handle_message(message) {
                    let _ = producer_out.push(reply);
                }
            }

            let frames = data.len() / mixer.channels().max(1);

            // Drop stale input so mic latency stays within two blocks.
            let backlog = mic_consumer.slots();
            if backlog > frames * 2 {
                for _ in 0..backlog - frames {
                    let _ = mic_consumer.pop();
                }
            }

            let wanted = frames.min(mic_block.len());
            let mut filled = 0;
            while filled < wanted {
                match mic_consumer.pop() {
                    Ok(sample) => {
                        mic_block[filled] = sample;
                        filled += 1;
                    }
                    Err(_) => break,
                }
            }

            if let Some(event) = mixer.render(data, &mic_block[..filled]) {
                let _ = producer_out.push(event);
            }
            amplitude.store(mixer.amplitude());
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    let (input_stream, input_channels, input_sample_rate) =
        match build_input_stream(&host, sample_rate, buffer_frames, mic_producer, recording) {
            Ok(Some((stream, config))) => (Some(stream), config.channels, config.sample_rate),
            Ok(None) => {
                log::warn!("No input device found; microphone and recording unavailable");
                (None, 0, sample_rate)
            }
            Err(err) => {
                log::warn!("Failed to open input stream: {}", err);
                (None, 0, sample_rate)
            }
        };

    let handle = AudioStreamHandle {
        output_stream,
        input_stream,
        consumer: consumer_out,
        output_sample_rate: sample_rate,
        input_channels,
        input_sample_rate,
    };

    Ok((handle, producer_in))
}

/// Builds the capture stream on the default input device.
///
/// The input runs at the output rate when the device accepts it. Otherwise it
/// runs at its own default configuration and the microphone samples are
/// resampled to the output rate before they reach the mic ring.
fn build_input_stream(
    host: &cpal::Host,
    sample_rate: u32,
    buffer_frames: u32,
    mic_producer: Producer<f32>,
    recording: RecordingSink,
) -> Result<Option<(Stream, StreamConfig)>, EngineError> {
    let Some(device) = host.default_input_device() else {
        return Ok(None);
    };

    let default_config = device.default_input_config()?;
    let preferred = StreamConfig {
        channels: default_config.channels(),
        sample_rate,
        buffer_size: BufferSize::Fixed(buffer_frames),
    };

    // The producer moves into whichever callback gets built.
    let shared_producer = Arc::new(Mutex::new(mic_producer));

    let stream = match device.build_input_stream(
        &preferred,
        input_callback(
            preferred.channels,
            None,
            shared_producer.clone(),
            recording.clone(),
        ),
        |err| log::error!("Input stream error: {}", err),
        None,
    ) {
        Ok(stream) => return Ok(Some((stream, preferred))),
        Err(err) => {
            log::warn!(
                "Input device rejected {} Hz ({}); using its default configuration",
                sample_rate,
                err
            );
            let fallback = default_config.config();
            let resampler = if fallback.sample_rate == sample_rate {
                None
            } else {
                log::info!(
                    "Converting microphone from {} Hz to {} Hz",
                    fallback.sample_rate,
                    sample_rate
                );
                Some(StreamResampler::new(fallback.sample_rate, sample_rate)?)
            };
            let stream = device.build_input_stream(
                &fallback,
                input_callback(fallback.channels, resampler, shared_producer, recording),
                |err| log::error!("Input stream error: {}", err),
                None,
            )?;
            (stream, fallback)
        }
    };

    Ok(Some(stream))
}

fn input_callback(
    channels: u16,
    mut resampler: Option<StreamResampler>,
    mic_producer: Arc<Mutex<Producer<f32>>>,
    recording: RecordingSink,
) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
    move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if let Ok(mut producer) = mic_producer.try_lock() {
            capture_block(
                data,
                channels as usize,
                resampler.as_mut(),
                &mut producer,
                &recording,
            );
        }
    }
}

/// Pushes one input block to the mic ring (mono, at the output rate) and to the
/// active recording (raw, at the input rate).
///
/// Never blocks: a full ring drops the rest of the block and a contended
/// recording lock skips it.
fn capture_block(
    data: &[f32],
    channels: usize,
    resampler: Option<&mut StreamResampler>,
    mic_producer: &mut Producer<f32>,
    recording: &RecordingSink,
) {
    match resampler {
        Some(resampler) => resampler.process(mono_frames(data, channels), |block| {
            push_mic(mic_producer, block.iter().copied())
        }),
        None => push_mic(mic_producer, mono_frames(data, channels)),
    }

    if let Ok(mut guard) = recording.try_lock() {
        if let Some(writer) = guard.as_mut() {
            for &sample in data {
                if writer.write_sample(sample).is_err() {
                    break;
                }
            }
        }
    }
}

fn push_mic(mic_producer: &mut Producer<f32>, samples: impl Iterator<Item = f32>) {
    for sample in samples {
        if mic_producer.push(sample).is_err() {
            break;
        }
    }
}

/// Start playing the audio streams
pub fn start_stream(handle: &AudioStreamHandle) -> Result<(), EngineError> {
    handle.output_stream.play()?;
    if let Some(input) = &handle.input_stream {
        input.play()?;
    }
    Ok(())
}
