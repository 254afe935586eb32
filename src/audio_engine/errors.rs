//! Audio-specific error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading audio files.
#[derive(Debug, Error)]
pub enum SampleLoadError {
    /// Failed to open the audio file.
    #[error("failed to open file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the audio file.
    #[error("failed to decode audio file: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Failed to create resampler.
    #[error("failed to create resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    /// Failed to resample audio.
    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    /// Audio file has no default track.
    #[error("audio file has no default track")]
    NoDefaultTrack,

    /// Audio file is missing sample rate information.
    #[error("audio file is missing a sample rate")]
    MissingSampleRate,

    /// Audio file is missing channel information.
    #[error("audio file is missing channel information")]
    MissingChannels,

    /// Unsupported channel mapping configuration.
    #[error(
        "unsupported channel mapping: file has {file_channels} channels, output has {output_channels} channels"
    )]
    UnsupportedChannels {
        /// Number of channels in the source file.
        file_channels: usize,
        /// Number of channels expected for output.
        output_channels: usize,
    },
}

/// Errors raised by the audio engine and its streams.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine not initialized")]
    NotInitialized,

    #[error("audio engine already initialized")]
    AlreadyInitialized,

    #[error("no {0} audio device found")]
    NoDevice(&'static str),

    #[error("failed to query device configuration: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("cannot convert microphone rate: {0}")]
    MicResampler(#[from] rubato::ResamplerConstructionError),

    #[error("failed to send {0} - buffer may be full")]
    QueueFull(&'static str),

    #[error("failed to acquire {0} lock")]
    Lock(&'static str),

    #[error("value out of range for {name}: {value}")]
    OutOfRange { name: &'static str, value: f32 },

    #[error("already recording to {0}")]
    AlreadyRecording(PathBuf),

    #[error("not recording")]
    NotRecording,

    #[error("failed to write recording: {0}")]
    Recording(#[from] hound::Error),

    #[error(transparent)]
    SampleLoad(#[from] SampleLoadError),
}
