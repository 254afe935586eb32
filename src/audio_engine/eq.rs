use std::f32::consts::PI;

use crate::audio_engine::constants::{
    BANDWIDTHS_HZ, CENTER_FREQUENCIES_HZ, EAR_CANAL_PEAK_1, EAR_CANAL_PEAK_2,
    EAR_CANAL_SHELF_GAIN, EAR_CANAL_SHELF_HZ, EAR_CANAL_SHELF_Q, NUM_BANDS,
};

/// Gains are floored here so a zero gain cannot produce a degenerate filter.
const MIN_LINEAR_GAIN: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

#[derive(Clone, Copy, Default)]
pub struct BiquadState {
    z1: f32,
    z2: f32,
}

fn biquad_process(coeffs: BiquadCoeffs, state: &mut BiquadState, x: f32) -> f32 {
    let y = coeffs.b0 * x + state.z1;
    state.z1 = coeffs.b1 * x - coeffs.a1 * y + state.z2;
    state.z2 = coeffs.b2 * x - coeffs.a2 * y;
    y
}

fn clamp_freq_hz(fs_hz: f32, freq_hz: f32) -> f32 {
    let nyquist = fs_hz * 0.5;
    let max_hz = (nyquist * 0.9).max(1.0);
    freq_hz.clamp(1.0, max_hz)
}

fn normalize_biquad(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> BiquadCoeffs {
    if !a0.is_finite() || a0.abs() < 1e-12 {
        return BiquadCoeffs::identity();
    }

    let inv_a0 = 1.0 / a0;
    let coeffs = BiquadCoeffs {
        b0: b0 * inv_a0,
        b1: b1 * inv_a0,
        b2: b2 * inv_a0,
        a1: a1 * inv_a0,
        a2: a2 * inv_a0,
    };

    if [coeffs.b0, coeffs.b1, coeffs.b2, coeffs.a1, coeffs.a2]
        .iter()
        .all(|v| v.is_finite())
    {
        coeffs
    } else {
        BiquadCoeffs::identity()
    }
}

/// Peaking filter with a bandwidth given in Hz and a linear gain at the center.
pub fn biquad_peaking(fs_hz: f32, center_hz: f32, bandwidth_hz: f32, gain: f32) -> BiquadCoeffs {
    if !fs_hz.is_finite() || fs_hz <= 0.0 || !gain.is_finite() {
        return BiquadCoeffs::identity();
    }

    let center_hz = clamp_freq_hz(fs_hz, center_hz);
    let q = center_hz / bandwidth_hz.max(1.0);
    let a = gain.max(MIN_LINEAR_GAIN).sqrt();

    let w0 = 2.0 * PI * center_hz / fs_hz;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha / a;

    normalize_biquad(b0, b1, b2, a0, a1, a2)
}

/// Low shelf with a linear gain below the corner frequency.
pub fn biquad_low_shelf(fs_hz: f32, corner_hz: f32, gain: f32, q: f32) -> BiquadCoeffs {
    if !fs_hz.is_finite() || fs_hz <= 0.0 || !gain.is_finite() || q <= 0.0 {
        return BiquadCoeffs::identity();
    }

    let corner_hz = clamp_freq_hz(fs_hz, corner_hz);
    let a = gain.max(MIN_LINEAR_GAIN).sqrt();

    let w0 = 2.0 * PI * corner_hz / fs_hz;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha);
    let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
    let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha);
    let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
    let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
    let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha;

    normalize_biquad(b0, b1, b2, a0, a1, a2)
}

pub fn coeffs_for_bands(fs_hz: f32, gains: &[f32; NUM_BANDS]) -> [BiquadCoeffs; NUM_BANDS] {
    std::array::from_fn(|band| {
        biquad_peaking(
            fs_hz,
            CENTER_FREQUENCIES_HZ[band],
            BANDWIDTHS_HZ[band],
            gains[band],
        )
    })
}

/// Nine peaking filters in series, one per audiometric band.
pub struct BandChain {
    fs_hz: f32,
    coeffs: [BiquadCoeffs; NUM_BANDS],
    state: [BiquadState; NUM_BANDS],
}

impl BandChain {
    pub fn new(fs_hz: f32) -> Self {
        Self {
            fs_hz,
            coeffs: coeffs_for_bands(fs_hz, &[1.0; NUM_BANDS]),
            state: [BiquadState::default(); NUM_BANDS],
        }
    }

    /// Recomputes the filters for new linear band gains.
    pub fn set_gains(&mut self, gains: &[f32; NUM_BANDS]) {
        self.coeffs = coeffs_for_bands(self.fs_hz, gains);
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let mut y = x;
        for (coeffs, state) in self.coeffs.iter().zip(self.state.iter_mut()) {
            y = biquad_process(*coeffs, state, y);
        }
        y
    }

    pub fn reset(&mut self) {
        self.state = [BiquadState::default(); NUM_BANDS];
    }
}

/// Fixed three-stage correction for the missing ear-canal resonance.
pub struct EarCanalFilter {
    coeffs: [BiquadCoeffs; 3],
    state: [BiquadState; 3],
}

impl EarCanalFilter {
    pub fn new(fs_hz: f32) -> Self {
        let (peak1_hz, peak1_bw, peak1_gain) = EAR_CANAL_PEAK_1;
        let (peak2_hz, peak2_bw, peak2_gain) = EAR_CANAL_PEAK_2;

        Self {
            coeffs: [
                biquad_low_shelf(
                    fs_hz,
                    EAR_CANAL_SHELF_HZ,
                    EAR_CANAL_SHELF_GAIN,
                    EAR_CANAL_SHELF_Q,
                ),
                biquad_peaking(fs_hz, peak1_hz, peak1_bw, peak1_gain),
                biquad_peaking(fs_hz, peak2_hz, peak2_bw, peak2_gain),
            ],
            state: [BiquadState::default(); 3],
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let mut y = x;
        for (coeffs, state) in self.coeffs.iter().zip(self.state.iter_mut()) {
            y = biquad_process(*coeffs, state, y);
        }
        y
    }

    pub fn reset(&mut self) {
        self.state = [BiquadState::default(); 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 48_000.0;

    fn sine_peak_after_settling(
        mut process: impl FnMut(f32) -> f32,
        freq_hz: f32,
        total: usize,
    ) -> f32 {
        let mut peak = 0.0_f32;
        for n in 0..total {
            let x = (2.0 * PI * freq_hz * n as f32 / FS).sin();
            let y = process(x);
            if n >= total - total / 10 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_peaking_unity_gain_is_transparent() {
        let coeffs = biquad_peaking(FS, 1_000.0, 667.0, 1.0);
        let mut state = BiquadState::default();

        for n in 0..1_000 {
            let x = (n as f32 * 0.37).sin();
            let y = biquad_process(coeffs, &mut state, x);
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_peaking_cut_at_center() {
        let coeffs = biquad_peaking(FS, 1_000.0, 667.0, 0.1);
        let mut state = BiquadState::default();

        let peak = sine_peak_after_settling(
            |x| biquad_process(coeffs, &mut state, x),
            1_000.0,
            48_000,
        );
        assert!((peak - 0.1).abs() < 0.01, "peak was {peak}");
    }

    #[test]
    fn test_low_shelf_dc_gain() {
        let coeffs = biquad_low_shelf(FS, 700.0, 0.178, 0.7);
        let mut state = BiquadState::default();

        let mut y = 0.0;
        for _ in 0..48_000 {
            y = biquad_process(coeffs, &mut state, 1.0);
        }
        assert!((y - 0.178).abs() < 1e-3, "dc gain was {y}");
    }

    #[test]
    fn test_invalid_sample_rate_is_identity() {
        assert_eq!(
            biquad_peaking(0.0, 1_000.0, 667.0, 2.0),
            BiquadCoeffs::identity()
        );
        assert_eq!(
            biquad_low_shelf(f32::NAN, 700.0, 0.178, 0.7),
            BiquadCoeffs::identity()
        );
    }

    #[test]
    fn test_band_chain_flat_by_default() {
        let mut chain = BandChain::new(FS);
        let peak = sine_peak_after_settling(|x| chain.process(x), 440.0, 24_000);
        assert!((peak - 1.0).abs() < 0.01, "peak was {peak}");
    }

    #[test]
    fn test_band_chain_attenuates_high_bands() {
        let mut gains = [1.0; NUM_BANDS];
        gains[5] = 0.01; // 2 kHz at -40 dB

        let mut chain = BandChain::new(FS);
        chain.set_gains(&gains);
        let cut = sine_peak_after_settling(|x| chain.process(x), 2_000.0, 48_000);

        chain.reset();
        let low = sine_peak_after_settling(|x| chain.process(x), 125.0, 48_000);

        assert!(cut < 0.05, "2 kHz peak was {cut}");
        assert!(low > 0.8, "125 Hz peak was {low}");
    }

    #[test]
    fn test_ear_canal_filter_is_stable() {
        let mut filter = EarCanalFilter::new(44_100.0);
        for n in 0..44_100 {
            let x = if n % 100 == 0 { 1.0 } else { 0.0 };
            assert!(filter.process(x).is_finite());
        }
    }
}
