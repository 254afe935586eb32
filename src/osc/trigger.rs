//! Mode-trigger transitions.
//!
//! [`step`] is a pure function of the current state, one event and the settings. It returns the
//! next state and the effects the caller must perform, in order.

use std::time::Duration;

use crate::config::OscConfig;
use crate::osc::Mode;

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSettings {
    pub threshold: f32,
    pub countdown: Duration,
    pub foreground_volume: f32,
    pub background_volume: f32,
    pub acknowledge_inbound: bool,
}

impl TriggerSettings {
    pub fn volume_for(&self, mode: Mode) -> f32 {
        match mode {
            Mode::Vr => self.background_volume,
            Mode::Ar => self.foreground_volume,
        }
    }
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self::from(&OscConfig::default())
    }
}

impl From<&OscConfig> for TriggerSettings {
    fn from(config: &OscConfig) -> Self {
        Self {
            threshold: config.threshold,
            countdown: config.countdown(),
            foreground_volume: config.foreground_volume,
            background_volume: config.background_volume,
            acknowledge_inbound: config.acknowledge_inbound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TriggerState {
    pub mode: Mode,
    /// Amplitude seen at the previous poll.
    pub previous_amplitude: f32,
    pub countdown_enabled: bool,
    pub countdown_armed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerEvent {
    /// The manager started; seeds the amplitude baseline.
    Started { amplitude: f32 },
    /// Periodic microphone amplitude sample.
    Amplitude(f32),
    CountdownElapsed,
    /// Mode code received from the peer.
    Received(i32),
    SetCountdown(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Send(Mode),
    SetMixerVolume(f32),
    ArmCountdown(Duration),
    CancelCountdown,
}

pub fn step(
    state: TriggerState,
    event: TriggerEvent,
    settings: &TriggerSettings,
) -> (TriggerState, Vec<Effect>) {
    let mut next = state;
    let mut effects = Vec::new();

    match event {
        TriggerEvent::Started { amplitude } => {
            next.previous_amplitude = if amplitude.is_finite() { amplitude } else { 0.0 };
        }

        TriggerEvent::Amplitude(amplitude) => {
            if !amplitude.is_finite() {
                return (state, effects);
            }
            let delta = amplitude - state.previous_amplitude;
            next.previous_amplitude = amplitude;

            if delta > settings.threshold && state.mode == Mode::Vr {
                next.mode = Mode::Ar;
                effects.push(Effect::Send(Mode::Ar));
                effects.push(Effect::SetMixerVolume(settings.foreground_volume));
                if state.countdown_enabled {
                    next.countdown_armed = true;
                    effects.push(Effect::ArmCountdown(settings.countdown));
                }
            }
        }

        TriggerEvent::CountdownElapsed => {
            next.countdown_armed = false;
            if state.mode == Mode::Ar {
                next.mode = Mode::Vr;
                effects.push(Effect::Send(Mode::Vr));
                effects.push(Effect::SetMixerVolume(settings.background_volume));
            }
        }

        TriggerEvent::Received(code) => {
            let Some(mode) = Mode::from_code(code) else {
                return (state, effects);
            };

            if mode == Mode::Vr && state.countdown_armed {
                next.countdown_armed = false;
                effects.push(Effect::CancelCountdown);
            }
            if settings.acknowledge_inbound && mode != state.mode {
                effects.push(Effect::Send(mode));
            }
            next.mode = mode;
            effects.push(Effect::SetMixerVolume(settings.volume_for(mode)));
        }

        TriggerEvent::SetCountdown(enabled) => {
            next.countdown_enabled = enabled;
            if !enabled && state.countdown_armed {
                next.countdown_armed = false;
                effects.push(Effect::CancelCountdown);
            }
        }
    }

    (next, effects)
}
