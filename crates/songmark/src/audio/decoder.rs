//! WAV decoding into a mono float sample buffer.
//!
//! The renderer only ever sees mono `f32` samples; multi-channel input is
//! downmixed by averaging the interleaved channels.

use std::io::Cursor;

use hound::SampleFormat;

use crate::error::DecodeError;

/// Decoded audio: mono samples plus the metadata the pipeline back-fills
/// onto the recording row.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

/// Decodes raw WAV bytes into mono `f32` samples.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(DecodeError::Malformed("zero channel count".to_string()));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(DecodeError::from)?,
        (SampleFormat::Int, bits) if bits <= 32 => {
            // Scale signed integers to [-1, 1] by the format's full range.
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(DecodeError::from)?
        }
        (format, bits) => {
            return Err(DecodeError::UnsupportedFormat(format!(
                "{format:?} at {bits} bits per sample"
            )))
        }
    };

    if interleaved.is_empty() {
        return Err(DecodeError::NoSamples);
    }

    let channels = spec.channels;
    let samples = downmix(&interleaved, channels);
    let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels,
        duration_seconds,
    })
}

/// Averages interleaved channel data into a mono buffer. A trailing
/// partial frame (truncated file) is dropped.
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    let channels = channels as usize;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
