use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongmarkConfig {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem object store.
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_recordings_bucket")]
    pub recordings_bucket: String,
    #[serde(default = "default_spectrograms_bucket")]
    pub spectrograms_bucket: String,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_storage_root() -> String {
    dirs::home_dir()
        .map(|h| h.join(".songmark").join("storage").display().to_string())
        .unwrap_or_else(|| "./storage".to_string())
}

fn default_recordings_bucket() -> String {
    "recordings".to_string()
}

fn default_spectrograms_bucket() -> String {
    "spectrograms".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            recordings_bucket: default_recordings_bucket(),
            spectrograms_bucket: default_spectrograms_bucket(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Soft per-job deadline in seconds.
    #[serde(default = "default_soft_deadline_secs")]
    pub soft_deadline_secs: u64,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_soft_deadline_secs() -> u64 {
    300
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            soft_deadline_secs: default_soft_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_pixels_per_second")]
    pub pixels_per_second: f64,
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    /// Fixed hop length; derived per recording when unset.
    #[serde(default)]
    pub hop_length: Option<usize>,
    /// Hz cap on the rendered band; Nyquist when unset.
    #[serde(default)]
    pub max_frequency: Option<u32>,
}

fn default_pixels_per_second() -> f64 {
    200.0
}

fn default_min_width() -> u32 {
    800
}

fn default_max_width() -> u32 {
    3200
}

fn default_height() -> u32 {
    400
}

fn default_n_fft() -> usize {
    2048
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pixels_per_second: default_pixels_per_second(),
            min_width: default_min_width(),
            max_width: default_max_width(),
            height: default_height(),
            n_fft: default_n_fft(),
            hop_length: None,
            max_frequency: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
    #[serde(default = "default_detail_ttl_secs")]
    pub detail_ttl_secs: u64,
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_listing_ttl_secs() -> u64 {
    300
}

fn default_detail_ttl_secs() -> u64 {
    1800
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            listing_ttl_secs: default_listing_ttl_secs(),
            detail_ttl_secs: default_detail_ttl_secs(),
        }
    }
}
