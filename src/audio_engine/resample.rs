//! Sample rate conversion.
//!
//! Recordings are converted once, off the audio thread, before they reach the
//! file player. The microphone is converted block by block when the input device
//! cannot run at the output rate.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio_engine::constants::{FILE_RESAMPLE_CHUNK_FRAMES, MIC_RESAMPLE_CHUNK_FRAMES};
use crate::audio_engine::errors::{EngineError, SampleLoadError};

fn file_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn mic_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 64,
        f_cutoff: 0.9,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::Blackman2,
    }
}

/// Converts interleaved audio from `from_hz` to `to_hz`.
///
/// # Parameters
///
/// - `samples`: Interleaved samples, whole frames only
/// - `channels`: Number of interleaved channels
/// - `from_hz`: Rate of `samples`
/// - `to_hz`: Rate of the result
///
/// # Returns
///
/// Interleaved samples at `to_hz`, `frames * to_hz / from_hz` frames long and
/// aligned with the input (the filter delay is removed).
///
/// # Errors
///
/// Resampler construction or processing failures.
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    from_hz: u32,
    to_hz: u32,
) -> Result<Vec<f32>, SampleLoadError> {
    if from_hz == to_hz || channels == 0 || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = f64::from(to_hz) / f64::from(from_hz);
    let frames = samples.len() / channels;
    let expected = (frames as f64 * ratio).round() as usize;

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, file_params(), FILE_RESAMPLE_CHUNK_FRAMES, channels)?;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|ch| {
            samples
                .chunks_exact(channels)
                .map(|frame| frame[ch])
                .collect()
        })
        .collect();

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(delay + expected); channels];
    let mut start = 0;
    while start + FILE_RESAMPLE_CHUNK_FRAMES <= frames {
        let chunk: Vec<&[f32]> = planar
            .iter()
            .map(|ch| &ch[start..start + FILE_RESAMPLE_CHUNK_FRAMES])
            .collect();
        append_planar(&mut out, resampler.process(&chunk, None)?);
        start += FILE_RESAMPLE_CHUNK_FRAMES;
    }
    if start < frames {
        let rest: Vec<&[f32]> = planar.iter().map(|ch| &ch[start..]).collect();
        append_planar(&mut out, resampler.process_partial(Some(rest.as_slice()), None)?);
    }

    // Flush the filter tail.
    while out[0].len() < delay + expected {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail.first().is_none_or(|ch| ch.is_empty()) {
            break;
        }
        append_planar(&mut out, tail);
    }

    let end = (delay + expected).min(out[0].len());
    let mut interleaved = Vec::with_capacity(end.saturating_sub(delay) * channels);
    for frame in delay..end {
        for ch in &out {
            interleaved.push(ch[frame]);
        }
    }

    log::debug!(
        "Resampled {} frames {} Hz -> {} frames {} Hz",
        frames,
        from_hz,
        interleaved.len() / channels,
        to_hz
    );
    Ok(interleaved)
}

fn append_planar(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(block) {
        dst.extend_from_slice(&src);
    }
}

/// Block-wise mono converter for the microphone path.
///
/// Buffers are allocated up front; [`process`](Self::process) does not allocate.
pub struct StreamResampler {
    resampler: SincFixedIn<f32>,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
}

impl StreamResampler {
    /// # Errors
    ///
    /// Returns [`EngineError::MicResampler`] for rates rubato cannot convert between.
    pub fn new(from_hz: u32, to_hz: u32) -> Result<Self, EngineError> {
        let ratio = f64::from(to_hz) / f64::from(from_hz.max(1));
        let resampler =
            SincFixedIn::<f32>::new(ratio, 1.0, mic_params(), MIC_RESAMPLE_CHUNK_FRAMES, 1)?;
        let output = vec![vec![0.0; resampler.output_frames_max()]];

        Ok(Self {
            resampler,
            input: vec![Vec::with_capacity(MIC_RESAMPLE_CHUNK_FRAMES)],
            output,
        })
    }

    /// Feeds mono samples and hands every converted block to `emit`.
    ///
    /// Samples that do not fill a whole chunk wait for the next call.
    pub fn process(&mut self, samples: impl IntoIterator<Item = f32>, mut emit: impl FnMut(&[f32])) {
        for sample in samples {
            self.input[0].push(sample);
            if self.input[0].len() < MIC_RESAMPLE_CHUNK_FRAMES {
                continue;
            }

            if let Ok((_, written)) =
                self.resampler
                    .process_into_buffer(&self.input, &mut self.output, None)
            {
                emit(&self.output[0][..written]);
            }
            self.input[0].clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, rate: u32, hz: f32) -> Vec<f32> {
        (0..frames)
            .map(|n| (2.0 * std::f32::consts::PI * hz * n as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_same_rate_is_untouched() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resample_interleaved(&input, 2, 48_000, 48_000).unwrap(), input);
    }

    #[test]
    fn test_resample_length_follows_ratio() {
        // 0.1 s of stereo at 44.1 kHz
        let mut input = Vec::new();
        for s in sine(4_410, 44_100, 440.0) {
            input.push(s);
            input.push(-s);
        }

        let output = resample_interleaved(&input, 2, 44_100, 48_000).unwrap();
        assert_eq!(output.len(), 4_800 * 2);
    }

    #[test]
    fn test_resample_keeps_level() {
        let input = vec![0.5; 3_000];
        let output = resample_interleaved(&input, 1, 16_000, 48_000).unwrap();

        assert_eq!(output.len(), 9_000);
        let middle = output[4_500];
        assert!((middle - 0.5).abs() < 0.02, "middle sample was {middle}");
    }

    #[test]
    fn test_resample_short_file() {
        // Shorter than one resampler chunk
        let input = vec![0.25; 100];
        let output = resample_interleaved(&input, 1, 24_000, 48_000).unwrap();
        assert_eq!(output.len(), 200);
    }

    #[test]
    fn test_stream_resampler_upsamples_mic() {
        let mut resampler = StreamResampler::new(16_000, 48_000).unwrap();
        let mut produced = Vec::new();

        resampler.process(vec![0.5; 16_000], |block| produced.extend_from_slice(block));

        // Whole chunks only; the last partial chunk stays buffered.
        let chunks = 16_000 / MIC_RESAMPLE_CHUNK_FRAMES;
        let expected = chunks * MIC_RESAMPLE_CHUNK_FRAMES * 3;
        assert!(
            produced.len().abs_diff(expected) <= chunks,
            "produced {} samples, expected about {expected}",
            produced.len()
        );

        let late = produced[produced.len() - 100];
        assert!((late - 0.5).abs() < 0.05, "late sample was {late}");
    }

    #[test]
    fn test_stream_resampler_waits_for_full_chunk() {
        let mut resampler = StreamResampler::new(44_100, 48_000).unwrap();
        let mut calls = 0;

        resampler.process(vec![0.0; MIC_RESAMPLE_CHUNK_FRAMES - 1], |_| calls += 1);
        assert_eq!(calls, 0);

        resampler.process([0.0], |_| calls += 1);
        assert_eq!(calls, 1);
    }
}
