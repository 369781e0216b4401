use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

use crate::error::CacheError;

use super::CacheBackend;

/// Payload plus the lifetime it was stored with. moka's cache-wide TTL
/// does not fit listing and detail entries expiring at different rates,
/// so each entry carries its own.
#[derive(Clone)]
struct CachedEntry {
    payload: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct MokaBackend {
    cache: Cache<String, CachedEntry>,
}

impl MokaBackend {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries. Pending maintenance is flushed first so
    /// counts are exact.
    #[cfg(test)]
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl CacheBackend for MokaBackend {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).map(|entry| entry.payload))
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), CachedEntry { payload: value, ttl });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key);
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();
        for key in matching {
            self.cache.invalidate(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let backend = MokaBackend::new(128);
        backend
            .set("k1", "v1".to_string(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(backend.get("k1").unwrap(), Some("v1".to_string()));
        assert_eq!(backend.get("absent").unwrap(), None);
    }

    #[test]
    fn test_per_entry_ttl_expires() {
        let backend = MokaBackend::new(128);
        backend
            .set("short", "x".to_string(), Duration::from_millis(20))
            .unwrap();
        backend
            .set("long", "y".to_string(), Duration::from_secs(60))
            .unwrap();

        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(backend.get("short").unwrap(), None);
        assert_eq!(backend.get("long").unwrap(), Some("y".to_string()));
    }

    #[test]
    fn test_remove_prefix_leaves_other_keys() {
        let backend = MokaBackend::new(128);
        let ttl = Duration::from_secs(60);
        backend.set("app:p1:a", "1".to_string(), ttl).unwrap();
        backend.set("app:p1:b", "2".to_string(), ttl).unwrap();
        backend.set("app:p2:a", "3".to_string(), ttl).unwrap();

        backend.remove_prefix("app:p1:").unwrap();

        assert_eq!(backend.get("app:p1:a").unwrap(), None);
        assert_eq!(backend.get("app:p1:b").unwrap(), None);
        assert_eq!(backend.get("app:p2:a").unwrap(), Some("3".to_string()));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let backend = MokaBackend::new(128);
        backend
            .set("k", "v".to_string(), Duration::from_secs(60))
            .unwrap();
        backend.remove("k").unwrap();
        backend.remove("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
        assert_eq!(backend.entry_count(), 0);
    }
}
