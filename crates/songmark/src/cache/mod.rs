//! Cache-aside layer for recording reads.
//!
//! The backend is swappable behind `CacheBackend`; the in-process
//! default is a moka cache with per-entry TTLs. Backend failures never
//! surface to callers — a broken cache degrades reads to misses and
//! writes to no-ops, with the failure logged.

pub mod moka_backend;
pub mod recording_cache;

pub use moka_backend::MokaBackend;
pub use recording_cache::{RecordingCache, CACHE_PREFIX};

use std::time::Duration;

use crate::error::CacheError;

/// String-keyed JSON-payload cache with per-entry expiry.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Drops every entry whose key starts with `prefix`.
    fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}
