use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SongmarkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audio decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQL failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Could not prepare database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration v{version} ({description}) failed: {source}")]
    Migration {
        version: u32,
        description: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Audio payload is empty")]
    EmptyInput,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    Malformed(String),

    #[error("Audio contains no samples")]
    NoSamples,
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::Unsupported => {
                DecodeError::UnsupportedFormat("unsupported WAV encoding".to_string())
            }
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot render an empty sample buffer")]
    EmptySamples,

    #[error("Invalid render parameters: {0}")]
    InvalidParameters(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transient store failure on '{bucket}/{key}': {source}")]
    Transient {
        bucket: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: '{bucket}/{key}'")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Failed to provision bucket '{bucket}': {source}")]
    Bucket {
        bucket: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store I/O failure on '{bucket}/{key}': {source}")]
    Io {
        bucket: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Retries exhausted after {attempts} attempts on '{bucket}/{key}': {source}")]
    RetriesExhausted {
        bucket: String,
        key: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Transient failures are worth retrying with a fresh connection;
    /// everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }

    /// Missing objects are success for best-effort cleanup deletes.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job queue is full")]
    QueueFull,

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SongmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_transient_classification() {
        let transient = StoreError::Transient {
            bucket: "recordings".to_string(),
            key: "a/b.wav".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(transient.is_transient());
        assert!(!transient.is_not_found());

        let missing = StoreError::NotFound {
            bucket: "spectrograms".to_string(),
            key: "x.png".to_string(),
        };
        assert!(!missing.is_transient());
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_hound_error_maps_to_decode_error() {
        let err: DecodeError = hound::Error::Unsupported.into();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = StoreError::RetriesExhausted {
            bucket: "recordings".to_string(),
            key: "r1.wav".to_string(),
            attempts: 3,
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"),
        };
        let msg = err.to_string();
        assert!(msg.contains("recordings/r1.wav"));
        assert!(msg.contains("3 attempts"));
    }
}
