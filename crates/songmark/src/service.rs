//! Recording service: the operation surface callers talk to.
//!
//! Owns upload, listing, status, artifact retrieval and deletion, and
//! wires the cache-aside and fire-and-forget enqueue behavior around
//! the repositories so callers never touch them directly.

use std::io::Read;
use std::sync::Arc;

use chrono::Utc;
use log::warn;
use serde::Serialize;

use crate::cache::recording_cache::CachedListing;
use crate::cache::RecordingCache;
use crate::db::job_repo::{self, JobStatus};
use crate::db::recording_repo::{self, RecordingFilter, RecordingRow};
use crate::db::Database;
use crate::error::{Result, SongmarkError, StoreError};
use crate::pipeline::Pipeline;
use crate::store::ObjectStore;
use crate::worker::{Orchestrator, Priority};

/// Job status as surfaced to callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub recording_id: String,
    pub status: JobStatus,
    /// True only for a completed job whose artifact is recorded.
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
}

/// Artifact retrieval outcome.
pub enum ArtifactState {
    Ready(Box<dyn Read + Send>),
    /// No job yet, or the job is pending or processing.
    NotReady,
    Failed(String),
}

pub struct RecordingService {
    db: Database,
    store: Arc<dyn ObjectStore>,
    orchestrator: Orchestrator,
    cache: Arc<RecordingCache>,
    recordings_bucket: String,
    spectrograms_bucket: String,
}

impl RecordingService {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        orchestrator: Orchestrator,
        cache: Arc<RecordingCache>,
        recordings_bucket: String,
        spectrograms_bucket: String,
    ) -> Self {
        Self {
            db,
            store,
            orchestrator,
            cache,
            recordings_bucket,
            spectrograms_bucket,
        }
    }

    /// Stores the raw audio, registers the recording and queues its
    /// spectrogram. The upload itself succeeds even when the queue is
    /// saturated; the job can be re-enqueued later.
    pub fn upload(&self, project_id: &str, filename: &str, bytes: &[u8]) -> Result<RecordingRow> {
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(SongmarkError::Store(StoreError::InvalidKey {
                key: filename.to_string(),
                reason: "filename must be a bare name".to_string(),
            }));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let storage_path = format!("{project_id}/{id}/{filename}");
        let content_type = mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        self.store
            .put(&self.recordings_bucket, &storage_path, bytes, &content_type)?;

        let recording = RecordingRow {
            id: id.clone(),
            project_id: project_id.to_string(),
            filename: filename.to_string(),
            storage_path,
            duration_seconds: None,
            sample_rate: None,
            created_at: Utc::now().to_rfc3339(),
        };
        recording_repo::insert(&self.db, &recording)?;
        self.cache.invalidate_project(project_id);

        // Fire and forget: a full queue must not fail the upload.
        if let Err(e) = self.orchestrator.enqueue(&id, Priority::Interactive) {
            warn!("Could not queue spectrogram for {id}: {e}");
        }

        Ok(recording)
    }

    pub fn get_recording(&self, recording_id: &str) -> Result<Option<RecordingRow>> {
        if let Some(hit) = self.cache.get_detail(recording_id) {
            return Ok(Some(hit));
        }
        let row = recording_repo::find_by_id(&self.db, recording_id)?;
        if let Some(ref recording) = row {
            self.cache.set_detail(recording);
        }
        Ok(row)
    }

    pub fn list_recordings(
        &self,
        project_id: &str,
        filter: &RecordingFilter,
    ) -> Result<(Vec<RecordingRow>, u64)> {
        if let Some(hit) = self.cache.get_listing(project_id, filter) {
            return Ok((hit.rows, hit.total));
        }
        let (rows, total) = recording_repo::list(&self.db, project_id, filter)?;
        self.cache.set_listing(
            project_id,
            filter,
            &CachedListing {
                rows: rows.clone(),
                total,
            },
        );
        Ok((rows, total))
    }

    /// Current job status for a recording, or `None` when no job exists
    /// yet (the recording itself must exist).
    pub fn status(&self, recording_id: &str) -> Result<Option<JobStatusView>> {
        let Some(row) = job_repo::find_by_recording(&self.db, recording_id)? else {
            return Ok(None);
        };
        let available = row.status == JobStatus::Completed && row.artifact_path.is_some();
        Ok(Some(JobStatusView {
            recording_id: row.recording_id,
            status: row.status,
            available,
            width: row.width,
            height: row.height,
            error_message: row.error_message,
            processing_time_seconds: row.processing_time_seconds,
        }))
    }

    /// Streams the finished spectrogram, or reports why it cannot.
    pub fn artifact(&self, recording_id: &str) -> Result<ArtifactState> {
        let Some(row) = job_repo::find_by_recording(&self.db, recording_id)? else {
            return Ok(ArtifactState::NotReady);
        };
        match row.status {
            JobStatus::Completed => match row.artifact_path {
                Some(key) => {
                    let reader = self.store.get(&self.spectrograms_bucket, &key)?;
                    Ok(ArtifactState::Ready(reader))
                }
                None => Ok(ArtifactState::NotReady),
            },
            JobStatus::Failed => Ok(ArtifactState::Failed(
                row.error_message
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
            JobStatus::Pending | JobStatus::Processing => Ok(ArtifactState::NotReady),
        }
    }

    /// Queues (or re-queues) spectrogram generation for one recording.
    pub fn regenerate(&self, recording_id: &str) -> Result<crate::worker::EnqueueOutcome> {
        self.orchestrator.enqueue(recording_id, Priority::Interactive)
    }

    /// Back-fills spectrograms for every recording missing one.
    pub fn regenerate_missing(&self) -> Result<usize> {
        self.orchestrator.enqueue_missing()
    }

    /// Removes a recording, its job row (by cascade), its stored objects
    /// and its cache entries. Object deletion is best effort: the row is
    /// the source of truth and an orphaned blob is harmless.
    pub fn delete(&self, recording_id: &str) -> Result<bool> {
        let Some(recording) = recording_repo::find_by_id(&self.db, recording_id)? else {
            return Ok(false);
        };

        let removed = recording_repo::delete(&self.db, recording_id)?;
        if !removed {
            return Ok(false);
        }

        if let Err(e) = self
            .store
            .delete(&self.recordings_bucket, &recording.storage_path)
        {
            warn!("Could not delete audio for {recording_id}: {e}");
        }
        let artifact_key = Pipeline::artifact_key(recording_id);
        if let Err(e) = self.store.delete(&self.spectrograms_bucket, &artifact_key) {
            warn!("Could not delete spectrogram for {recording_id}: {e}");
        }

        self.cache.invalidate_recording(recording_id);
        self.cache.invalidate_project(&recording.project_id);

        Ok(true)
    }
}
