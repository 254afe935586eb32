//! OSC mode switching between VR (background) and AR (foreground).
//!
//! - [`trigger`]: the pure transition function
//! - [`wire`]: OSC packet encoding and decoding
//! - [`transport`]: the UDP link behind [`ModeTransport`]
//! - [`manager`]: the service object that polls the microphone and drives the link

use std::fmt;

use thiserror::Error;

pub mod manager;
pub mod transport;
pub mod trigger;
pub mod wire;

pub use manager::{OscManager, OscService};
pub use transport::{ModeTransport, UdpModeLink};
pub use trigger::{Effect, TriggerEvent, TriggerSettings, TriggerState, step};

/// Simulator mode as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Virtual reality: the simulation sits in the background.
    #[default]
    Vr,
    /// Augmented reality: the simulation is in the foreground.
    Ar,
}

impl Mode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Mode::Vr),
            2 => Some(Mode::Ar),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Mode::Vr => 1,
            Mode::Ar => 2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Vr => f.write_str("VR"),
            Mode::Ar => f.write_str("AR"),
        }
    }
}

/// Transport and encoding failures.
#[derive(Debug, Error)]
pub enum OscError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode OSC packet: {0}")]
    Encode(String),

    #[error("cannot resolve {0}")]
    Resolve(String),
}

/// Reasons an inbound payload is discarded.
#[derive(Debug, Error, PartialEq)]
pub enum InboundError {
    #[error("malformed OSC packet: {0}")]
    Malformed(String),

    #[error("message was empty")]
    Empty,

    #[error("message was not an integer")]
    NotInteger,
}
