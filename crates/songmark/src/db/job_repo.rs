//! Job repository — the `spectrogram_jobs` table and its state machine.
//!
//! One row per recording (`recording_id` is the primary key). Transitions
//! are single conditional UPDATE statements, so the row itself is the
//! serialization point for concurrent workers: whoever wins `claim` owns
//! the processing run, and everyone else observes the in-flight row.

use chrono::Utc;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// Upper bound on stored error messages; longer decode errors are cut
/// before they hit the row.
pub const MAX_ERROR_LEN: usize = 500;

/// Lifecycle of a spectrogram job: pending → processing → completed | failed.
/// `failed` is retryable (re-enqueue resets it), `completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw spectrogram job row.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub recording_id: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub processing_time_seconds: Option<f64>,
    pub artifact_path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JSON snapshot of the render parameters (reproducibility record).
    pub parameters: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get("status")?;
        let status = JobStatus::parse(&status_str).unwrap_or_else(|| {
            log::warn!("Unknown job status '{status_str}', defaulting to pending");
            JobStatus::Pending
        });
        Ok(Self {
            recording_id: row.get("recording_id")?,
            status,
            error_message: row.get("error_message")?,
            processing_time_seconds: row.get("processing_time_seconds")?,
            artifact_path: row.get("artifact_path")?,
            width: row.get("width")?,
            height: row.get("height")?,
            parameters: row.get("parameters")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Truncate an error message to `MAX_ERROR_LEN` characters on a char
/// boundary so arbitrarily large decode errors never bloat the row.
fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Finds the job for a recording.
pub fn find_by_recording(
    db: &Database,
    recording_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM spectrogram_jobs WHERE recording_id = ?1")?;
        let mut rows = stmt.query_map(params![recording_id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Creates the job row in `pending`, or resets an existing `failed` row to
/// `pending` (clearing its error). Rows that are pending, processing or
/// completed are left untouched — enqueue's idempotent short-circuit reads
/// them back instead.
pub fn ensure_pending(db: &Database, recording_id: &str) -> Result<(), DatabaseError> {
    let ts = now();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO spectrogram_jobs (recording_id, status, created_at, updated_at)
             VALUES (?1, 'pending', ?2, ?2)
             ON CONFLICT(recording_id) DO UPDATE SET
                 status = 'pending',
                 error_message = NULL,
                 updated_at = excluded.updated_at
             WHERE spectrogram_jobs.status = 'failed'",
            params![recording_id, ts],
        )?;
        Ok(())
    })
}

/// Attempts to take ownership of the job: pending/failed → processing,
/// clearing any prior error. Returns false when another worker already
/// owns it or the job is complete — the caller must then skip the render.
pub fn claim(db: &Database, recording_id: &str) -> Result<bool, DatabaseError> {
    let ts = now();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE spectrogram_jobs
             SET status = 'processing', error_message = NULL, updated_at = ?2
             WHERE recording_id = ?1 AND status IN ('pending', 'failed')",
            params![recording_id, ts],
        )?;
        Ok(changed == 1)
    })
}

/// processing → completed. Artifact fields and the parameters snapshot are
/// written in the same statement as the status, so the completed/artifact
/// invariant holds at every observation point.
pub fn mark_completed(
    db: &Database,
    recording_id: &str,
    artifact_path: &str,
    width: u32,
    height: u32,
    processing_time_seconds: f64,
    parameters_json: &str,
) -> Result<(), DatabaseError> {
    let ts = now();
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE spectrogram_jobs
             SET status = 'completed', error_message = NULL, artifact_path = ?2,
                 width = ?3, height = ?4, processing_time_seconds = ?5,
                 parameters = ?6, updated_at = ?7
             WHERE recording_id = ?1",
            params![
                recording_id,
                artifact_path,
                width,
                height,
                processing_time_seconds,
                parameters_json,
                ts
            ],
        )?;
        Ok(())
    })
}

/// processing → failed. The message is truncated and the artifact fields
/// cleared, preserving the failed/error invariant.
pub fn mark_failed(
    db: &Database,
    recording_id: &str,
    error_message: &str,
    processing_time_seconds: Option<f64>,
) -> Result<(), DatabaseError> {
    let ts = now();
    let message = truncate_error(error_message);
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE spectrogram_jobs
             SET status = 'failed', error_message = ?2, artifact_path = NULL,
                 width = NULL, height = NULL, processing_time_seconds = ?3,
                 updated_at = ?4
             WHERE recording_id = ?1",
            params![recording_id, message, processing_time_seconds, ts],
        )?;
        Ok(())
    })
}

/// processing → pending for every row, returning how many were reset.
///
/// A `processing` row whose worker died with the process would otherwise
/// stay claimed forever. Running this once at startup, before any worker
/// takes jobs, stands in for the redelivery an external queue would do.
pub fn recover_stale_processing(db: &Database) -> Result<u64, DatabaseError> {
    let ts = now();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE spectrogram_jobs
             SET status = 'pending', updated_at = ?1
             WHERE status = 'processing'",
            params![ts],
        )?;
        Ok(changed as u64)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM spectrogram_jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
