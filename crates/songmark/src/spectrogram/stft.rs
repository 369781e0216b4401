//! Short-time Fourier transform over a mono sample buffer.

use std::f32::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

/// Computes the magnitude STFT with a Hann window of size `n_fft` stepped
/// by `hop`. Returns one row per frame, each holding the `n_fft / 2 + 1`
/// non-redundant magnitude bins. Frames extending past the end of the
/// buffer are zero-padded, so even inputs shorter than `n_fft` yield a
/// frame.
pub fn magnitude_stft(samples: &[f32], n_fft: usize, hop: usize) -> Vec<Vec<f32>> {
    assert!(n_fft > 1, "n_fft must be > 1");
    assert!(hop > 0, "hop must be > 0");

    if samples.is_empty() {
        return Vec::new();
    }

    let window = hann_window(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let bins = n_fft / 2 + 1;

    let mut frames = Vec::with_capacity(samples.len() / hop + 1);
    let mut buffer = vec![Complex::default(); n_fft];

    for start in (0..samples.len()).step_by(hop) {
        let end = (start + n_fft).min(samples.len());

        for (idx, slot) in buffer.iter_mut().enumerate() {
            let value = if start + idx < end {
                samples[start + idx] * window[idx]
            } else {
                0.0
            };
            *slot = Complex { re: value, im: 0.0 };
        }

        fft.process(&mut buffer);

        let magnitude: Vec<f32> = buffer[..bins].iter().map(|c| c.norm()).collect();
        frames.push(magnitude);
    }

    frames
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|idx| {
            let theta = 2.0 * PI * idx as f32 / (size - 1) as f32;
            0.5 - 0.5 * theta.cos()
        })
        .collect()
}

/// Frequency in Hz of a given STFT bin.
pub fn bin_frequency(bin: usize, n_fft: usize, sample_rate: u32) -> f64 {
    bin as f64 * sample_rate as f64 / n_fft as f64
}
