use log::{debug, info};

use crate::db::{job_repo, recording_repo, Database};
use crate::error::{SongmarkError, WorkerError};

use super::job::{Job, Priority};
use super::queue::JobQueue;

/// What an enqueue request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A finished artifact already exists; nothing was submitted.
    AlreadyCompleted { artifact_path: String },
    /// A job is already pending or processing for this recording.
    InFlight,
    /// A new (or reset) job was submitted to the queue.
    Enqueued,
}

/// Job admission for the worker pool. Enqueueing is idempotent per
/// recording: completed work short-circuits, a job being processed is
/// joined, and absent, pending or failed jobs produce a submission.
pub struct Orchestrator {
    db: Database,
    queue: JobQueue,
}

impl Orchestrator {
    pub fn new(db: Database, queue: JobQueue) -> Self {
        Self { db, queue }
    }

    pub fn enqueue(
        &self,
        recording_id: &str,
        priority: Priority,
    ) -> Result<EnqueueOutcome, SongmarkError> {
        if recording_repo::find_by_id(&self.db, recording_id)?.is_none() {
            return Err(WorkerError::RecordingNotFound(recording_id.to_string()).into());
        }

        if let Some(row) = job_repo::find_by_recording(&self.db, recording_id)? {
            if row.status == job_repo::JobStatus::Completed {
                if let Some(artifact_path) = row.artifact_path {
                    debug!("Recording {recording_id} already has a spectrogram, skipping");
                    return Ok(EnqueueOutcome::AlreadyCompleted { artifact_path });
                }
            }
            if row.status == job_repo::JobStatus::Processing {
                debug!("Recording {recording_id} is being processed, joining");
                return Ok(EnqueueOutcome::InFlight);
            }
            // Pending rows are re-submitted: the row may have missed the
            // queue (full lane, restart). Duplicate submissions collapse
            // at claim time.
        }

        job_repo::ensure_pending(&self.db, recording_id)?;
        let job = match priority {
            Priority::Interactive => Job::interactive(recording_id),
            Priority::Bulk => Job::bulk(recording_id),
        };
        self.queue.submit(job)?;
        Ok(EnqueueOutcome::Enqueued)
    }

    /// Submits bulk jobs for every recording without a completed
    /// spectrogram. Returns how many were submitted; recordings whose
    /// jobs are in flight are skipped.
    pub fn enqueue_missing(&self) -> Result<usize, SongmarkError> {
        let candidates = recording_repo::ids_without_completed_job(&self.db)?;
        let mut submitted = 0;
        for id in &candidates {
            match self.enqueue(id, Priority::Bulk)? {
                EnqueueOutcome::Enqueued => submitted += 1,
                _ => {}
            }
        }
        if submitted > 0 {
            info!("Queued {submitted} recordings for spectrogram back-fill");
        }
        Ok(submitted)
    }
}
