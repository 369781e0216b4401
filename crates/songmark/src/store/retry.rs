//! Retry-with-backoff and reconnect-on-failure over any `ObjectStore`.
//!
//! Transient connection failures often correlate with a stale handle, so
//! each retry rebuilds the inner store through the connector before
//! trying again. Non-transient failures propagate immediately.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::StoreError;

use super::ObjectStore;

/// Builds (or rebuilds) the underlying store handle.
pub type Connector = dyn Fn() -> Arc<dyn ObjectStore> + Send + Sync;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: base, 2*base, 4*base, ...
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

pub struct RetryingStore {
    connector: Box<Connector>,
    inner: Mutex<Arc<dyn ObjectStore>>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(connector: Box<Connector>, policy: RetryPolicy) -> Self {
        let inner = connector();
        Self {
            connector,
            inner: Mutex::new(inner),
            policy,
        }
    }

    fn current(&self) -> Arc<dyn ObjectStore> {
        self.inner
            .lock()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    fn reconnect(&self) -> Arc<dyn ObjectStore> {
        let fresh = (self.connector)();
        match self.inner.lock() {
            Ok(mut guard) => *guard = Arc::clone(&fresh),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&fresh),
        }
        fresh
    }
}

impl ObjectStore for RetryingStore {
    fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.current().ensure_bucket(bucket)
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut store = self.current();
        let mut attempt = 1u32;

        loop {
            match store.put(bucket, key, bytes, content_type) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    log::warn!(
                        "Transient put failure on {bucket}/{key} \
                         (attempt {attempt}/{}), reconnecting and retrying in {delay:?}: {err}",
                        self.policy.max_attempts
                    );
                    std::thread::sleep(delay);
                    store = self.reconnect();
                    attempt += 1;
                }
                Err(StoreError::Transient { source, .. }) => {
                    return Err(StoreError::RetriesExhausted {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        self.current().get(bucket, key)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.current().delete(bucket, key)
    }
}
