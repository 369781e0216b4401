use std::path::Path;

use crate::config::schema::SongmarkConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SongmarkConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<SongmarkConfig, ConfigError> {
    let config: SongmarkConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &SongmarkConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.workers.count == 0 {
        return Err(ConfigError::Validation {
            message: "workers.count must be at least 1".to_string(),
        });
    }

    if config.render.min_width == 0 || config.render.min_width > config.render.max_width {
        return Err(ConfigError::Validation {
            message: format!(
                "Render width bounds are inverted: min {} > max {}",
                config.render.min_width, config.render.max_width
            ),
        });
    }

    if config.render.height == 0 {
        return Err(ConfigError::Validation {
            message: "render.height must be positive".to_string(),
        });
    }

    // The STFT needs a power-of-two window for the radix FFT path and
    // at least two bins of output.
    if config.render.n_fft < 16 || !config.render.n_fft.is_power_of_two() {
        return Err(ConfigError::Validation {
            message: format!("render.n_fft must be a power of two >= 16, got {}", config.render.n_fft),
        });
    }

    if config.render.hop_length == Some(0) {
        return Err(ConfigError::Validation {
            message: "render.hop_length must be positive when set".to_string(),
        });
    }

    if config.storage.retry_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "storage.retry_attempts must be at least 1".to_string(),
        });
    }

    Ok(())
}
