//! Keyed cache facade for recording listings and details.
//!
//! Listing keys embed the project id ahead of the query-shape hash, so
//! a write to one project invalidates exactly that project's listings
//! and leaves every other project's cached pages warm.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::db::recording_repo::{RecordingFilter, RecordingRow, SortField, SortOrder};

use super::CacheBackend;

pub const CACHE_PREFIX: &str = "songmark:cache";

/// Cached result of a paged listing query.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct CachedListing {
    pub rows: Vec<RecordingRow>,
    pub total: u64,
}

pub struct RecordingCache {
    backend: Arc<dyn CacheBackend>,
    listing_ttl: Duration,
    detail_ttl: Duration,
}

impl RecordingCache {
    pub fn new(backend: Arc<dyn CacheBackend>, listing_ttl: Duration, detail_ttl: Duration) -> Self {
        Self {
            backend,
            listing_ttl,
            detail_ttl,
        }
    }

    pub fn listing_key(project_id: &str, filter: &RecordingFilter) -> String {
        format!(
            "{CACHE_PREFIX}:recordings:{project_id}:{:016x}",
            filter_fingerprint(filter)
        )
    }

    pub fn detail_key(recording_id: &str) -> String {
        format!("{CACHE_PREFIX}:recording:{recording_id}")
    }

    pub fn get_listing(&self, project_id: &str, filter: &RecordingFilter) -> Option<CachedListing> {
        self.get_json(&Self::listing_key(project_id, filter))
    }

    pub fn set_listing(&self, project_id: &str, filter: &RecordingFilter, listing: &CachedListing) {
        self.set_json(&Self::listing_key(project_id, filter), listing, self.listing_ttl);
    }

    pub fn get_detail(&self, recording_id: &str) -> Option<RecordingRow> {
        self.get_json(&Self::detail_key(recording_id))
    }

    pub fn set_detail(&self, recording: &RecordingRow) {
        self.set_json(&Self::detail_key(&recording.id), recording, self.detail_ttl);
    }

    /// Drops every cached listing page for one project.
    pub fn invalidate_project(&self, project_id: &str) {
        let prefix = format!("{CACHE_PREFIX}:recordings:{project_id}:");
        if let Err(e) = self.backend.remove_prefix(&prefix) {
            log::warn!("Cache invalidation failed for project {project_id}: {e}");
        }
    }

    pub fn invalidate_recording(&self, recording_id: &str) {
        if let Err(e) = self.backend.remove(&Self::detail_key(recording_id)) {
            log::warn!("Cache invalidation failed for recording {recording_id}: {e}");
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = match self.backend.get(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {key}, treating as miss: {e}");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                // A stale or corrupt entry must not poison reads.
                log::warn!("Discarding undecodable cache entry {key}: {e}");
                let _ = self.backend.remove(key);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Cache serialization failed for {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, payload, ttl) {
            log::warn!("Cache write failed for {key}: {e}");
        }
    }
}

/// Hashes the query shape into a stable 64-bit fingerprint. Two filters
/// that would run the same SQL hash to the same key.
fn filter_fingerprint(filter: &RecordingFilter) -> u64 {
    let mut hasher = DefaultHasher::new();
    filter.search.hash(&mut hasher);
    filter.min_duration.map(f64::to_bits).hash(&mut hasher);
    filter.max_duration.map(f64::to_bits).hash(&mut hasher);
    sort_field_tag(filter.sort_by).hash(&mut hasher);
    sort_order_tag(filter.sort_order).hash(&mut hasher);
    filter.limit.hash(&mut hasher);
    filter.offset.hash(&mut hasher);
    hasher.finish()
}

fn sort_field_tag(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::Filename => "filename",
        SortField::Duration => "duration",
    }
}

fn sort_order_tag(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}
