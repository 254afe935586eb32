//! Interleaved channel layout conversions.

use crate::audio_engine::errors::SampleLoadError;

/// Converts decoded interleaved samples to the player's channel layout.
///
/// Recordings keep the raw layout of whatever input device made them, so the
/// file side can have any channel count:
/// - a mono file is copied to every output channel
/// - a mono output gets the average of each frame
/// - a wider file keeps its leading channels
///
/// Upmixing a multi-channel file is not supported.
pub fn map_channels(
    samples: Vec<f32>,
    file_channels: usize,
    output_channels: usize,
) -> Result<Vec<f32>, SampleLoadError> {
    if file_channels == 0 || output_channels == 0 {
        return Err(SampleLoadError::UnsupportedChannels {
            file_channels,
            output_channels,
        });
    }
    if file_channels == output_channels {
        return Ok(samples);
    }

    let mapped = if output_channels == 1 {
        mono_frames(&samples, file_channels).collect()
    } else if file_channels == 1 {
        samples
            .iter()
            .flat_map(|&s| std::iter::repeat_n(s, output_channels))
            .collect()
    } else if file_channels > output_channels {
        samples
            .chunks_exact(file_channels)
            .flat_map(|frame| frame[..output_channels].iter().copied())
            .collect()
    } else {
        return Err(SampleLoadError::UnsupportedChannels {
            file_channels,
            output_channels,
        });
    };
    Ok(mapped)
}

/// Averages each interleaved frame down to one sample.
///
/// Trailing samples that do not fill a whole frame are dropped.
pub fn mono_frames(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    let channels = channels.max(1);
    let scale = 1.0 / channels as f32;
    data.chunks_exact(channels)
        .map(move |frame| frame.iter().sum::<f32>() * scale)
}
