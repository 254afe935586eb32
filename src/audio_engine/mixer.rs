//! Real-time signal graph.
//!
//! This module provides the [`RtMixer`] struct which runs the whole simulation graph inside the
//! audio callback:
//!
//! mic → amplitude tap → mixer (volume, file player joins here) → ear-canal compensation →
//! left/right split → 9-band chain per ear → hard-panned stereo output.
//!
//! All state is owned by the audio thread and changed only through
//! [`ControlMessage`](crate::messages::ControlMessage)s.

use cpal::Sample;

use crate::audio_engine::analysis::AmplitudeTracker;
use crate::audio_engine::constants::{
    NUM_BANDS, PLAYER_VOLUME_MAX, VOLUME_MAX, VOLUME_MIN,
};
use crate::audio_engine::eq::{BandChain, EarCanalFilter};
use crate::gain_model::Channel;
use crate::messages::{AudioMessage, ControlMessage, SampleBuffer};

/// File playback cursor over a buffer already at the output rate.
struct PlayerVoice {
    sample: SampleBuffer,
    frame: usize,
}

impl PlayerVoice {
    fn new(sample: SampleBuffer) -> Self {
        Self { sample, frame: 0 }
    }

    /// Next stereo frame, or `None` once the file is exhausted.
    fn next_frame(&mut self) -> Option<(f32, f32)> {
        if self.frame >= self.sample.frames() {
            return None;
        }

        let channels = self.sample.channels;
        let base = self.frame * channels;
        let left = self.sample.samples[base];
        let right = self.sample.samples[base + 1.min(channels - 1)];

        self.frame += 1;
        Some((left, right))
    }
}

/// Real-time mixer that renders the hearing-loss simulation graph.
pub struct RtMixer {
    /// Number of output channels (1 for mono, 2 or more for stereo).
    channels: usize,

    /// Whether microphone input reaches the graph.
    mic_enabled: bool,

    /// Main mixer volume.
    volume: f32,

    /// File player volume (linear, may exceed 1).
    player_volume: f32,

    ear_canal_enabled: bool,

    /// Ear-canal compensation, one instance per ear.
    ear_canal: [EarCanalFilter; 2],

    /// Band chains indexed by ear (0 = left, 1 = right).
    bands: [BandChain; 2],

    tracker: AmplitudeTracker,

    player: Option<PlayerVoice>,
}

fn ear_index(channel: Channel) -> usize {
    match channel {
        Channel::Left => 0,
        Channel::Right => 1,
    }
}

impl RtMixer {
    /// Creates a new RtMixer for the given output layout.
    ///
    /// The microphone starts muted, the mixer at full volume, ear-canal
    /// compensation bypassed and both band chains flat.
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        let fs_hz = sample_rate as f32;
        Self {
            channels,
            mic_enabled: false,
            volume: VOLUME_MAX,
            player_volume: 1.0,
            ear_canal_enabled: false,
            ear_canal: [EarCanalFilter::new(fs_hz), EarCanalFilter::new(fs_hz)],
            bands: [BandChain::new(fs_hz), BandChain::new(fs_hz)],
            tracker: AmplitudeTracker::new(sample_rate),
            player: None,
        }
    }

    /// Applies a control message.
    ///
    /// Returns the reply for messages that have one.
    pub fn handle_message(&mut self, message: ControlMessage) -> Option<AudioMessage> {
        match message {
            ControlMessage::Ping() => return Some(AudioMessage::Pong()),
            ControlMessage::SetMicEnabled(enabled) => self.set_mic_enabled(enabled),
            ControlMessage::SetMixerVolume(volume) => self.set_volume(volume),
            ControlMessage::SetEarCanalCompensation(enabled) => {
                self.set_ear_canal_compensation(enabled)
            }
            ControlMessage::SetBandGains { channel, gains } => self.set_band_gains(channel, &gains),
            ControlMessage::StartPlayback { sample } => self.start_playback(sample),
            ControlMessage::StopPlayback() => self.stop_playback(),
            ControlMessage::SetPlayerVolume(volume) => self.set_player_volume(volume),
        }
        None
    }

    pub fn set_mic_enabled(&mut self, enabled: bool) {
        self.mic_enabled = enabled;
        if !enabled {
            self.tracker.reset();
        }
    }

    /// Sets the main mixer volume.
    ///
    /// Invalid values (NaN, infinite, or out of range) are silently ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&volume) {
            return;
        }

        self.volume = volume;
    }

    pub fn set_ear_canal_compensation(&mut self, enabled: bool) {
        if enabled && !self.ear_canal_enabled {
            for filter in &mut self.ear_canal {
                filter.reset();
            }
        }
        self.ear_canal_enabled = enabled;
    }

    /// Replaces the linear gains of one ear's band chain.
    ///
    /// Gain tables containing NaN or infinite values are ignored.
    pub fn set_band_gains(&mut self, channel: Channel, gains: &[f32; NUM_BANDS]) {
        if gains.iter().any(|g| !g.is_finite()) {
            return;
        }
        self.bands[ear_index(channel)].set_gains(gains);
    }

    pub fn start_playback(&mut self, sample: SampleBuffer) {
        if sample.channels == 0 || sample.frames() == 0 {
            return;
        }
        self.player = Some(PlayerVoice::new(sample));
    }

    pub fn stop_playback(&mut self) {
        self.player = None;
    }

    pub fn set_player_volume(&mut self, volume: f32) {
        if !volume.is_finite() || !(0.0..=PLAYER_VOLUME_MAX).contains(&volume) {
            return;
        }
        self.player_volume = volume;
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_some()
    }

    /// Smoothed amplitude of the microphone tap.
    pub fn amplitude(&self) -> f32 {
        self.tracker.amplitude()
    }

    /// Renders one block of interleaved output.
    ///
    /// `mic` holds mono microphone samples for the block; missing samples are
    /// treated as silence. Returns [`AudioMessage::PlaybackEnded`] when the file
    /// player runs out during this block.
    pub fn render(&mut self, output: &mut [f32], mic: &[f32]) -> Option<AudioMessage> {
        output.fill(Sample::EQUILIBRIUM);

        if self.channels == 0 {
            return None;
        }

        let frames = output.len() / self.channels;
        let mut playback_ended = false;

        for frame in 0..frames {
            let mic_sample = if self.mic_enabled {
                mic.get(frame).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            self.tracker.process(mic_sample);

            let (player_left, player_right) = match self.player.as_mut() {
                Some(player) => match player.next_frame() {
                    Some((l, r)) => (l * self.player_volume, r * self.player_volume),
                    None => {
                        self.player = None;
                        playback_ended = true;
                        (0.0, 0.0)
                    }
                },
                None => (0.0, 0.0),
            };

            let mut left = (mic_sample + player_left) * self.volume;
            let mut right = (mic_sample + player_right) * self.volume;

            if self.ear_canal_enabled {
                left = self.ear_canal[0].process(left);
                right = self.ear_canal[1].process(right);
            }

            let left = self.bands[0].process(left);
            let right = self.bands[1].process(right);

            let out_base = frame * self.channels;
            if self.channels == 1 {
                output[out_base] = (left + right) * 0.5;
            } else {
                output[out_base] = left;
                output[out_base + 1] = right;
            }
        }

        playback_ended.then_some(AudioMessage::PlaybackEnded())
    }

    /// Gets the number of channels configured for this mixer.
    pub fn channels(&self) -> usize {
        self.channels
    }
}
