//! Per-band gain curves for the left and right filter chains.
//!
//! Gains are stored as linear multipliers and exposed in dB. Writes made while
//! editing both ears fan out to both channels; reads use the left channel as
//! the reference.

use pyo3::prelude::*;
use thiserror::Error;

use crate::audio_engine::constants::{GAIN_DB_MAX, GAIN_DB_MIN, NUM_BANDS};

const GAIN_NONE: [f32; NUM_BANDS] = [1.0; NUM_BANDS];

// ≈ [-7, -7, -12, -15, -22, -25, -25, -25, -25] dB
const GAIN_MILD: [f32; NUM_BANDS] = [
    0.4467, 0.4467, 0.2512, 0.1778, 0.0794, 0.0562, 0.0562, 0.0562, 0.0562,
];

// ≈ [-22, -22, -27, -30, -37, -40, -40, -40, -40] dB
const GAIN_MODERATE: [f32; NUM_BANDS] = [
    0.0794, 0.0794, 0.0447, 0.0316, 0.0141, 0.0100, 0.0100, 0.0100, 0.0100,
];

// ≈ [-47, -47, -52, -55, -62, -65, -65, -65, -65] dB
const GAIN_SEVERE: [f32; NUM_BANDS] = [
    0.0045, 0.0045, 0.0025, 0.0018, 0.0008, 0.0006, 0.0006, 0.0006, 0.0006,
];

/// Errors raised by the gain model.
#[derive(Debug, Error, PartialEq)]
pub enum GainError {
    #[error("band index out of range: {0}")]
    BandOutOfRange(usize),

    #[error("gain must be a finite dB value, got {0}")]
    NonFiniteGain(f32),
}

/// Preset hearing-loss severity.
#[pyclass(eq, eq_int)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainSetting {
    /// No hearing loss: every band at unity gain.
    NoLoss,
    Mild,
    Moderate,
    Severe,
}

impl GainSetting {
    /// Maps a preset button index to a setting.
    ///
    /// Buttons 1..=3 select mild, moderate and severe; any other index
    /// selects no loss.
    pub fn from_button(index: usize) -> Self {
        match index {
            1 => Self::Mild,
            2 => Self::Moderate,
            3 => Self::Severe,
            _ => Self::NoLoss,
        }
    }

    /// Linear gain per band for this preset.
    pub fn curve(self) -> &'static [f32; NUM_BANDS] {
        match self {
            Self::NoLoss => &GAIN_NONE,
            Self::Mild => &GAIN_MILD,
            Self::Moderate => &GAIN_MODERATE,
            Self::Severe => &GAIN_SEVERE,
        }
    }
}

/// One of the two band chains.
#[pyclass(eq, eq_int)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

/// Which chain(s) UI edits apply to.
#[pyclass(eq, eq_int)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EditMode {
    Left,
    Right,
    #[default]
    Both,
}

impl EditMode {
    /// Channels that receive writes in this mode.
    pub fn targets(self) -> &'static [Channel] {
        match self {
            Self::Left => &[Channel::Left],
            Self::Right => &[Channel::Right],
            Self::Both => &[Channel::Left, Channel::Right],
        }
    }

    /// Channel whose values are shown in this mode.
    pub fn reference(self) -> Channel {
        match self {
            Self::Right => Channel::Right,
            Self::Left | Self::Both => Channel::Left,
        }
    }
}

/// `10^(dB/20)`.
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Parses a text-field gain entry.
///
/// Returns the value clamped to the editable dB range, or `None` when the text
/// is not a number (the caller keeps its previous value).
pub fn parse_gain_entry(text: &str) -> Option<f32> {
    let value: f32 = text.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(GAIN_DB_MIN, GAIN_DB_MAX))
}

/// Rounds a dB value the way gain text fields display it.
pub fn display_db(db: f32) -> i32 {
    db.round() as i32
}

/// Linear gain tables for both band chains.
#[derive(Debug, Clone, PartialEq)]
pub struct GainModel {
    left: [f32; NUM_BANDS],
    right: [f32; NUM_BANDS],
}

impl Default for GainModel {
    fn default() -> Self {
        Self {
            left: GAIN_NONE,
            right: GAIN_NONE,
        }
    }
}

impl GainModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, channel: Channel) -> &[f32; NUM_BANDS] {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    fn chain_mut(&mut self, channel: Channel) -> &mut [f32; NUM_BANDS] {
        match channel {
            Channel::Left => &mut self.left,
            Channel::Right => &mut self.right,
        }
    }

    /// Overwrites every band of `channel` with the preset curve.
    pub fn set_all_gains(&mut self, channel: Channel, setting: GainSetting) {
        *self.chain_mut(channel) = *setting.curve();
    }

    /// Sets one band from a dB value.
    ///
    /// Values outside the editable range are clamped to it.
    ///
    /// # Parameters
    ///
    /// - `channel`: Band chain to write
    /// - `index`: Band index, 0 (62.5 Hz) to 8 (16 kHz)
    /// - `gain_db`: New gain in dB
    ///
    /// # Errors
    ///
    /// - [`GainError::BandOutOfRange`] for `index >= 9`
    /// - [`GainError::NonFiniteGain`] for NaN or infinite gains
    pub fn set_individual_gain(
        &mut self,
        channel: Channel,
        index: usize,
        gain_db: f32,
    ) -> Result<(), GainError> {
        if index >= NUM_BANDS {
            return Err(GainError::BandOutOfRange(index));
        }
        if !gain_db.is_finite() {
            return Err(GainError::NonFiniteGain(gain_db));
        }

        let gain_db = gain_db.clamp(GAIN_DB_MIN, GAIN_DB_MAX);
        self.chain_mut(channel)[index] = db_to_linear(gain_db);
        Ok(())
    }

    /// All bands of `channel` in dB.
    pub fn get_gain(&self, channel: Channel) -> [f32; NUM_BANDS] {
        self.chain(channel).map(linear_to_db)
    }

    /// All bands of `channel` as linear multipliers.
    pub fn linear_gains(&self, channel: Channel) -> [f32; NUM_BANDS] {
        *self.chain(channel)
    }

    /// Makes the right chain equal to the left one.
    pub fn copy_left_to_right(&mut self) {
        self.right = self.left;
    }

    pub fn apply_preset(&mut self, mode: EditMode, setting: GainSetting) {
        for &channel in mode.targets() {
            self.set_all_gains(channel, setting);
        }
    }

    /// [`set_individual_gain`](Self::set_individual_gain) on every channel `mode` targets.
    pub fn apply_band_gain(
        &mut self,
        mode: EditMode,
        index: usize,
        gain_db: f32,
    ) -> Result<(), GainError> {
        for &channel in mode.targets() {
            self.set_individual_gain(channel, index, gain_db)?;
        }
        Ok(())
    }

    /// dB values shown for the given edit mode.
    pub fn display_gains(&self, mode: EditMode) -> [f32; NUM_BANDS] {
        self.get_gain(mode.reference())
    }
}
