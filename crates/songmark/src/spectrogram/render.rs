//! Spectrogram rendering: mono samples in, encoded PNG out.
//!
//! Pure with respect to everything but allocation — no I/O, no clock. The
//! pipeline owns deriving the target width from the recording's duration;
//! this module renders exactly what it is told.

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

use super::palette;
use super::stft::{bin_frequency, magnitude_stft};

/// Floor for magnitudes before the log, so silence does not produce -inf.
const AMIN: f32 = 1e-10;

/// Render request parameters.
#[derive(Debug, Clone)]
pub struct RenderParams {
    pub target_width: u32,
    pub target_height: u32,
    pub n_fft: usize,
    /// Fixed STFT step. When `None`, derived as
    /// `max(1, samples / target_width)` so rendered width tracks duration.
    pub hop_length: Option<usize>,
    /// Upper bound of the rendered frequency axis in Hz. Capped at the
    /// Nyquist frequency regardless; `None` means Nyquist.
    pub max_frequency: Option<u32>,
}

/// Reproducibility snapshot persisted with the job: exactly how the
/// artifact was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub n_fft: usize,
    pub hop_length: usize,
    pub sample_rate: u32,
    pub max_frequency: u32,
    pub duration: f64,
}

/// A rendered artifact: PNG bytes plus the dimensions and snapshot the
/// job row records.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub snapshot: ParameterSnapshot,
}

/// Renders a spectrogram PNG from mono samples.
pub fn render(
    samples: &[f32],
    sample_rate: u32,
    params: &RenderParams,
) -> Result<RenderedImage, RenderError> {
    if samples.is_empty() {
        return Err(RenderError::EmptySamples);
    }
    validate(sample_rate, params)?;

    let hop = params
        .hop_length
        .unwrap_or_else(|| (samples.len() / params.target_width as usize).max(1));

    // 1. STFT magnitudes: frames x bins.
    let frames = magnitude_stft(samples, params.n_fft, hop);

    // 2. Decibels referenced to the global maximum.
    let peak = frames
        .iter()
        .flat_map(|f| f.iter())
        .fold(AMIN, |acc, &m| acc.max(m));
    let db: Vec<Vec<f32>> = frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&m| 20.0 * (m.max(AMIN) / peak).log10())
                .collect()
        })
        .collect();

    // 3. Clamp the frequency axis; bins above the cap are discarded.
    let nyquist = sample_rate / 2;
    let cap = params.max_frequency.unwrap_or(nyquist).min(nyquist);
    let bins = clamped_bin_count(params.n_fft, sample_rate, cap);

    // 4. Min-max normalize the clamped matrix to u8. A zero range means
    //    silence; skip the division and emit the all-zero image.
    let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
    for frame in &db {
        for &v in &frame[..bins] {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    let range = hi - lo;

    // 5.+6. Flip so low frequencies sit at the bottom, then colorize.
    let mut raster = RgbImage::new(frames.len() as u32, bins as u32);
    for (x, frame) in db.iter().enumerate() {
        for bin in 0..bins {
            let level = if range > 0.0 {
                (((frame[bin] - lo) / range) * 255.0).round() as u8
            } else {
                0
            };
            let y = (bins - 1 - bin) as u32;
            raster.put_pixel(x as u32, y, Rgb(palette::viridis(level)));
        }
    }

    // 7. Resize to the target dimensions.
    let resized = image::imageops::resize(
        &raster,
        params.target_width,
        params.target_height,
        FilterType::Lanczos3,
    );

    // 8. PNG encode.
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(resized)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;

    Ok(RenderedImage {
        png,
        width: params.target_width,
        height: params.target_height,
        snapshot: ParameterSnapshot {
            n_fft: params.n_fft,
            hop_length: hop,
            sample_rate,
            max_frequency: cap,
            duration: samples.len() as f64 / sample_rate as f64,
        },
    })
}

/// Number of STFT bins whose center frequency is at or below `cap` Hz.
/// Always at least one (the DC bin).
pub fn clamped_bin_count(n_fft: usize, sample_rate: u32, cap: u32) -> usize {
    let total = n_fft / 2 + 1;
    (0..total)
        .take_while(|&bin| bin_frequency(bin, n_fft, sample_rate) <= cap as f64)
        .count()
        .max(1)
}

fn validate(sample_rate: u32, params: &RenderParams) -> Result<(), RenderError> {
    if sample_rate == 0 {
        return Err(RenderError::InvalidParameters(
            "sample rate must be positive".to_string(),
        ));
    }
    if params.target_width == 0 || params.target_height == 0 {
        return Err(RenderError::InvalidParameters(format!(
            "target dimensions must be positive, got {}x{}",
            params.target_width, params.target_height
        )));
    }
    if params.n_fft < 2 {
        return Err(RenderError::InvalidParameters(format!(
            "n_fft must be at least 2, got {}",
            params.n_fft
        )));
    }
    if params.hop_length == Some(0) {
        return Err(RenderError::InvalidParameters(
            "hop_length must be positive".to_string(),
        ));
    }
    Ok(())
}
