//! Message definitions for communication with the real-time audio thread.
//!
//! This module defines the enums that serve as the wire format for messages passed through the
//! ring buffers between the control side and the audio callback.

use std::sync::Arc;

use crate::audio_engine::constants::NUM_BANDS;
use crate::gain_model::Channel;

/// Pre-decoded, immutable interleaved audio.
#[derive(Debug, Clone)]
pub(crate) struct SampleBuffer {
    pub channels: usize,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }
}

/// Message that is emitted from the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioMessage {
    /// Response to a Ping message.
    Pong(),

    /// The file player reached the end of its file.
    PlaybackEnded(),
}

/// Message that is sent to the audio thread.
#[derive(Debug, Clone)]
pub(crate) enum ControlMessage {
    /// Used for testing message passing functionality.
    Ping(),

    /// Mute or unmute the microphone input.
    SetMicEnabled(bool),

    /// Set the main mixer volume.
    ///
    /// # Parameters
    /// * `volume` - Volume level (0.0 to 1.0)
    SetMixerVolume(f32),

    /// Enable or bypass the ear-canal compensation filters.
    SetEarCanalCompensation(bool),

    /// Replace the linear gains of one band chain.
    SetBandGains {
        channel: Channel,
        gains: [f32; NUM_BANDS],
    },

    /// Start playing a decoded file through the mixer from its beginning.
    StartPlayback { sample: SampleBuffer },

    /// Stop the file player.
    StopPlayback(),

    /// Set the file player volume (linear).
    SetPlayerVolume(f32),
}
