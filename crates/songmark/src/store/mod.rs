//! Object storage for raw recordings and rendered spectrograms.
//!
//! Everything upstream talks to the `ObjectStore` trait; the concrete
//! backend is a constructor-time decision. `RetryingStore` layers the
//! retry-with-backoff / reconnect policy over any backend.

use std::io::Read;

pub mod fs;
pub mod retry;

pub use fs::FsObjectStore;
pub use retry::{RetryPolicy, RetryingStore};

use crate::error::StoreError;

/// Byte-blob storage in named buckets.
///
/// `get` hands back a streaming reader so large artifacts are not fully
/// buffered by the caller; the caller drains or drops it.
pub trait ObjectStore: Send + Sync {
    /// Idempotent bucket provisioning — an existing bucket is success.
    fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Deleting a missing object is success; permission or connectivity
    /// failures surface.
    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// Reads an object fully into memory. Convenience for callers that need
/// the whole payload (the decode step does).
pub fn read_all(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
    let mut reader = store.get(bucket, key)?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| StoreError::Io {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: e,
        })?;
    Ok(buf)
}
