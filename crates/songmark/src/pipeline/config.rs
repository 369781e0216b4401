use crate::config::SongmarkConfig;

/// Render-time settings snapshotted from the application config.
pub struct PipelineConfig {
    pub recordings_bucket: String,
    pub spectrograms_bucket: String,
    /// Horizontal resolution before clamping, in pixels per second of audio.
    pub pixels_per_second: f64,
    pub min_width: u32,
    pub max_width: u32,
    pub height: u32,
    pub n_fft: usize,
    /// Fixed hop length. When unset the hop is derived per recording so
    /// the frame count lands near the target width.
    pub hop_length: Option<usize>,
    /// Upper frequency bound in Hz. Clamped to Nyquist at render time.
    pub max_frequency: Option<u32>,
}

impl PipelineConfig {
    pub fn from_config(config: &SongmarkConfig) -> Self {
        Self {
            recordings_bucket: config.storage.recordings_bucket.clone(),
            spectrograms_bucket: config.storage.spectrograms_bucket.clone(),
            pixels_per_second: config.render.pixels_per_second,
            min_width: config.render.min_width,
            max_width: config.render.max_width,
            height: config.render.height,
            n_fft: config.render.n_fft,
            hop_length: config.render.hop_length,
            max_frequency: config.render.max_frequency,
        }
    }

    /// Target image width for a recording: duration scaled to pixels,
    /// clamped to the configured bounds.
    pub fn target_width(&self, duration_seconds: f64) -> u32 {
        let scaled = (duration_seconds * self.pixels_per_second).round();
        if !scaled.is_finite() || scaled < self.min_width as f64 {
            return self.min_width;
        }
        if scaled > self.max_width as f64 {
            return self.max_width;
        }
        scaled as u32
    }
}
