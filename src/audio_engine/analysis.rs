use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::audio_engine::constants::AMPLITUDE_TIME_CONSTANT_S;

/// Reads the most recent microphone amplitude.
pub trait AmplitudeSource: Send + Sync {
    fn amplitude(&self) -> f32;
}

/// Lock-free handle publishing the tracked amplitude out of the audio thread.
#[derive(Clone, Default)]
pub struct SharedAmplitude(Arc<AtomicU32>);

impl SharedAmplitude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, amplitude: f32) {
        self.0.store(amplitude.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl AmplitudeSource for SharedAmplitude {
    fn amplitude(&self) -> f32 {
        self.load()
    }
}

/// Smoothed RMS follower for the microphone tap.
pub struct AmplitudeTracker {
    coefficient: f32,
    mean_square: f32,
}

impl AmplitudeTracker {
    pub fn new(sample_rate_hz: u32) -> Self {
        let samples = AMPLITUDE_TIME_CONSTANT_S * sample_rate_hz.max(1) as f32;
        Self {
            coefficient: (-1.0 / samples).exp(),
            mean_square: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) {
        if !x.is_finite() {
            return;
        }
        self.mean_square = self.coefficient * self.mean_square + (1.0 - self.coefficient) * x * x;
    }

    pub fn amplitude(&self) -> f32 {
        self.mean_square.sqrt()
    }

    pub fn reset(&mut self) {
        self.mean_square = 0.0;
    }
}
