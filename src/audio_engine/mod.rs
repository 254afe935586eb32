//! Audio Engine Module
//!
//! This module runs the simulation graph on the default audio devices.
//! It is organized into sub-modules, each with a specific responsibility:
//!
//! - [`audio_stream`]: CPAL stream management and the real-time callbacks
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Audio-specific error types
//! - [`eq`]: Band and ear-canal filters
//! - [`analysis`]: Microphone amplitude tracking
//! - [`mixer`]: Real-time signal graph
//! - [`sample_loader`]: Recording decoding for the file player
//! - [`resample`]: Sample rate conversion for recordings and the microphone
//!
//! The main [`AudioEngine`] struct owns the streams. The rest of the crate talks to it through
//! the [`AmplitudeSource`], [`MixerVolume`] and [`RecorderBackend`] capabilities.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hound::{SampleFormat, WavSpec, WavWriter};
use rtrb::Producer;

use crate::audio_engine::audio_stream::{
    AudioStreamHandle, RecordingSink, create_audio_stream, start_stream,
};
use crate::audio_engine::constants::{NUM_BANDS, PLAYER_VOLUME_MAX, VOLUME_MAX, VOLUME_MIN};
use crate::audio_engine::sample_loader::decode_audio_file_to_sample_buffer;
use crate::config::AudioConfig;
use crate::gain_model::Channel;
use crate::messages::{AudioMessage, ControlMessage};

pub use crate::audio_engine::analysis::{AmplitudeSource, SharedAmplitude};
pub use crate::audio_engine::errors::{EngineError, SampleLoadError};

pub(crate) mod analysis;
pub(crate) mod audio_stream;
pub(crate) mod channels;
pub mod constants;
pub(crate) mod eq;
pub(crate) mod errors;
pub(crate) mod mixer;
pub(crate) mod resample;
pub(crate) mod sample_loader;

/// Stereo output of the file player.
const PLAYER_CHANNELS: usize = 2;

/// Sets the main mixer volume.
pub trait MixerVolume: Send + Sync {
    fn set_mixer_volume(&self, volume: f32);
}

/// Recording and file playback, as used by the recorder controller.
pub trait RecorderBackend {
    /// Starts writing the raw input to `path`.
    fn start_recording(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Finalizes the current recording.
    fn stop_recording(&mut self) -> Result<(), EngineError>;

    /// Opens `path` and plays it through the graph from the start.
    fn play_file(&mut self, path: &Path) -> Result<(), EngineError>;

    fn stop_playback(&mut self) -> Result<(), EngineError>;

    /// Sets the file player volume (linear).
    fn set_player_volume(&mut self, volume: f32) -> Result<(), EngineError>;
}

/// Cloneable sending side of the control ring.
///
/// Empty until the engine is initialized, and emptied again on shutdown.
#[derive(Clone, Default)]
pub struct ControlSender {
    producer: Arc<Mutex<Option<Producer<ControlMessage>>>>,
}

impl ControlSender {
    fn install(&self, producer: Option<Producer<ControlMessage>>) -> Result<(), EngineError> {
        let mut guard = self
            .producer
            .lock()
            .map_err(|_| EngineError::Lock("producer"))?;
        *guard = producer;
        Ok(())
    }

    pub(crate) fn send(&self, message: ControlMessage, name: &'static str) -> Result<(), EngineError> {
        let mut guard = self
            .producer
            .lock()
            .map_err(|_| EngineError::Lock("producer"))?;
        let producer = guard.as_mut().ok_or(EngineError::NotInitialized)?;

        producer
            .push(message)
            .map_err(|_| EngineError::QueueFull(name))
    }

    /// Queues a mixer volume change.
    ///
    /// Invalid values are rejected before they reach the audio thread.
    pub fn set_volume(&self, volume: f32) -> Result<(), EngineError> {
        if !volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&volume) {
            return Err(EngineError::OutOfRange {
                name: "volume",
                value: volume,
            });
        }
        self.send(ControlMessage::SetMixerVolume(volume), "SetMixerVolume")
    }
}

impl MixerVolume for ControlSender {
    fn set_mixer_volume(&self, volume: f32) {
        if let Err(err) = self.set_volume(volume) {
            log::warn!("Mixer volume {} not applied: {}", volume, err);
        }
    }
}

/// Runs the hearing-loss simulation graph on the default devices.
pub struct AudioEngine {
    buffer_frames: u32,
    stream_handle: Option<AudioStreamHandle>,
    control: ControlSender,
    amplitude: SharedAmplitude,
    recording: RecordingSink,
    recording_path: Option<PathBuf>,
    mic_enabled: bool,
}

impl AudioEngine {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            buffer_frames: config.buffer_frames,
            stream_handle: None,
            control: ControlSender::default(),
            amplitude: SharedAmplitude::new(),
            recording: Arc::new(Mutex::new(None)),
            recording_path: None,
            mic_enabled: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.stream_handle.is_some()
    }

    /// Builds and starts the streams with the microphone muted.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.stream_handle.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        let (handle, producer) = create_audio_stream(
            self.buffer_frames,
            self.amplitude.clone(),
            self.recording.clone(),
        )?;
        start_stream(&handle)?;

        self.control.install(Some(producer))?;
        self.stream_handle = Some(handle);
        self.mic_enabled = false;
        Ok(())
    }

    /// Finalizes any recording and drops the streams.
    ///
    /// A recording that cannot be finalized is logged and the teardown goes on.
    pub fn shut_down(&mut self) -> Result<(), EngineError> {
        if self.recording_path.is_some() {
            if let Err(err) = self.stop_recording() {
                log::warn!("Recording not finalized on shutdown: {}", err);
            }
        }
        self.control.install(None)?;
        self.stream_handle = None;
        self.mic_enabled = false;
        self.amplitude.store(0.0);
        Ok(())
    }

    pub fn start_microphone(&mut self) -> Result<(), EngineError> {
        if self.mic_enabled {
            log::warn!("Microphone already started");
            return Ok(());
        }
        self.control
            .send(ControlMessage::SetMicEnabled(true), "SetMicEnabled")?;
        self.mic_enabled = true;
        Ok(())
    }

    pub fn stop_microphone(&mut self) -> Result<(), EngineError> {
        if !self.mic_enabled {
            log::warn!("Microphone already stopped");
            return Ok(());
        }
        self.control
            .send(ControlMessage::SetMicEnabled(false), "SetMicEnabled")?;
        self.mic_enabled = false;
        Ok(())
    }

    pub fn is_microphone_enabled(&self) -> bool {
        self.mic_enabled
    }

    pub fn set_mixer_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.control.set_volume(volume)
    }

    pub fn set_ear_canal_compensation(&self, enabled: bool) -> Result<(), EngineError> {
        self.control.send(
            ControlMessage::SetEarCanalCompensation(enabled),
            "SetEarCanalCompensation",
        )
    }

    /// Pushes one ear's linear band gains to the audio thread.
    pub fn set_band_gains(
        &self,
        channel: Channel,
        gains: [f32; NUM_BANDS],
    ) -> Result<(), EngineError> {
        if let Some(&bad) = gains.iter().find(|g| !g.is_finite() || **g < 0.0) {
            return Err(EngineError::OutOfRange {
                name: "band gain",
                value: bad,
            });
        }
        self.control
            .send(ControlMessage::SetBandGains { channel, gains }, "SetBandGains")
    }

    /// Send a ping message to the audio thread.
    pub fn ping(&self) -> Result<(), EngineError> {
        self.control.send(ControlMessage::Ping(), "Ping")
    }

    /// Drains every pending event from the audio thread.
    pub fn poll_messages(&mut self) -> Vec<AudioMessage> {
        let mut messages = Vec::new();
        if let Some(handle) = self.stream_handle.as_mut() {
            while let Ok(message) = handle.consumer.pop() {
                messages.push(message);
            }
        }
        messages
    }

    pub fn amplitude_source(&self) -> SharedAmplitude {
        self.amplitude.clone()
    }

    pub fn control_sender(&self) -> ControlSender {
        self.control.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.recording_path.is_some()
    }
}

impl RecorderBackend for AudioEngine {
    fn start_recording(&mut self, path: &Path) -> Result<(), EngineError> {
        if let Some(current) = &self.recording_path {
            return Err(EngineError::AlreadyRecording(current.clone()));
        }

        let handle = self
            .stream_handle
            .as_ref()
            .ok_or(EngineError::NotInitialized)?;
        if handle.input_stream.is_none() || handle.input_channels == 0 {
            return Err(EngineError::NoDevice("input"));
        }

        let spec = WavSpec {
            channels: handle.input_channels,
            sample_rate: handle.input_sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer: WavWriter<BufWriter<File>> = WavWriter::create(path, spec)?;

        let mut guard = self
            .recording
            .lock()
            .map_err(|_| EngineError::Lock("recording"))?;
        *guard = Some(writer);
        drop(guard);

        log::info!("Recording to {}", path.display());
        self.recording_path = Some(path.to_path_buf());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), EngineError> {
        let path = self.recording_path.take().ok_or(EngineError::NotRecording)?;

        let writer = self
            .recording
            .lock()
            .map_err(|_| EngineError::Lock("recording"))?
            .take();

        if let Some(writer) = writer {
            writer.finalize()?;
        }
        log::info!("Finished recording {}", path.display());
        Ok(())
    }

    fn play_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let output_rate_hz = self
            .stream_handle
            .as_ref()
            .ok_or(EngineError::NotInitialized)?
            .output_sample_rate;

        let sample = decode_audio_file_to_sample_buffer(path, PLAYER_CHANNELS, output_rate_hz)?;
        log::info!(
            "Playing {} ({:.1} s)",
            path.display(),
            sample.frames() as f32 / sample.sample_rate.max(1) as f32
        );
        self.control
            .send(ControlMessage::StartPlayback { sample }, "StartPlayback")
    }

    fn stop_playback(&mut self) -> Result<(), EngineError> {
        self.control
            .send(ControlMessage::StopPlayback(), "StopPlayback")
    }

    fn set_player_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        if !volume.is_finite() || !(0.0..=PLAYER_VOLUME_MAX).contains(&volume) {
            return Err(EngineError::OutOfRange {
                name: "player volume",
                value: volume,
            });
        }
        self.control
            .send(ControlMessage::SetPlayerVolume(volume), "SetPlayerVolume")
    }
}
