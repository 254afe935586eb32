//! Recording decoding for the file player.
//!
//! Files are decoded with Symphonia, mapped to the player's channel layout and converted to
//! the output rate here, so the mixer only has to step through frames.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::{
    audio::SampleBuffer as SymphoniaSampleBuffer, codecs::DecoderOptions,
    errors::Error as SymphoniaError, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::audio_engine::channels::map_channels;
use crate::audio_engine::errors::SampleLoadError;
use crate::audio_engine::resample::resample_interleaved;
use crate::messages::SampleBuffer;

/// Decodes an audio file into a sample buffer ready for the file player.
///
/// # Parameters
///
/// - `path`: Recording to load
/// - `output_channels`: Channel count of the player
/// - `output_rate_hz`: Output stream sample rate in Hz
///
/// # Errors
///
/// - File not found or cannot be opened
/// - Audio format not recognized or corrupted
/// - Unsupported channel count
/// - Rate conversion failure
pub fn decode_audio_file_to_sample_buffer(
    path: &Path,
    output_channels: usize,
    output_rate_hz: u32,
) -> Result<SampleBuffer, SampleLoadError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = detected.format;

    let track = format
        .default_track()
        .ok_or(SampleLoadError::NoDefaultTrack)?;
    let file_rate_hz = track
        .codec_params
        .sample_rate
        .ok_or(SampleLoadError::MissingSampleRate)?;
    let file_channels = track
        .codec_params
        .channels
        .ok_or(SampleLoadError::MissingChannels)?
        .count();

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut decoded: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(SampleLoadError::Decode(err)),
        };

        let audio_buf = decoder.decode(&packet)?;
        let spec = *audio_buf.spec();
        let duration = audio_buf.capacity() as u64;

        let mut sample_buf = SymphoniaSampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        decoded.extend_from_slice(sample_buf.samples());
    }

    log::debug!(
        "Decoded {} ({} ch@{} Hz, {} samples)",
        path.display(),
        file_channels,
        file_rate_hz,
        decoded.len()
    );

    let mapped = map_channels(decoded, file_channels, output_channels)?;
    let converted = resample_interleaved(&mapped, output_channels, file_rate_hz, output_rate_hz)?;

    Ok(SampleBuffer {
        channels: output_channels,
        sample_rate: output_rate_hz,
        samples: Arc::from(converted.into_boxed_slice()),
    })
}
