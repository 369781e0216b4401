use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use tokio::sync::broadcast;

use crate::cache::RecordingCache;
use crate::db::{job_repo, recording_repo, Database};
use crate::pipeline::progress::{
    BroadcastProgress, JobProgressEvent, NoopProgress, ProgressEvent, ProgressReporter, Stage,
};
use crate::pipeline::runner::JobPipeline;
use crate::pipeline::{PipelineContext, TIMEOUT_ERROR};
use crate::worker::job::{Job, JobResult};
use crate::worker::queue::JobQueue;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_count: usize,
    pub queue_capacity: usize,
    /// Soft deadline per job. A pipeline still running when it elapses
    /// has its job marked failed with the reserved timeout message.
    pub soft_deadline: Duration,
}

/// Per-worker shared state.
#[derive(Clone)]
struct WorkerContext {
    db: Database,
    pipeline: Arc<dyn JobPipeline>,
    cache: Arc<RecordingCache>,
    soft_deadline: Duration,
    progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
}

pub struct WorkerPool {
    queue: JobQueue,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts the pool.
    ///
    /// # Panics
    /// Panics if `settings.worker_count` is 0.
    pub fn new(
        db: Database,
        pipeline: Arc<dyn JobPipeline>,
        cache: Arc<RecordingCache>,
        settings: WorkerSettings,
        progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
    ) -> Self {
        assert!(settings.worker_count > 0, "worker_count must be > 0");

        let queue = JobQueue::new(settings.queue_capacity);
        let (result_sender, result_receiver) = bounded::<JobResult>(settings.queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let ctx = WorkerContext {
            db,
            pipeline,
            cache,
            soft_deadline: settings.soft_deadline,
            progress_sender,
        };

        let mut workers = Vec::with_capacity(settings.worker_count);
        for worker_id in 0..settings.worker_count {
            let worker_queue = queue.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_ctx = ctx.clone();

            workers.push(thread::spawn(move || {
                run_worker(worker_id, worker_queue, result_tx, shutdown_flag, worker_ctx);
            }));
        }

        info!("Started {} spectrogram workers", settings.worker_count);

        Self {
            queue,
            result_receiver,
            workers,
            shutdown,
        }
    }

    /// Submit handle usable from other threads (the orchestrator keeps one).
    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    pub fn submit(&self, job: Job) -> Result<(), crate::error::WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(crate::error::WorkerError::ChannelClosed);
        }
        self.queue.submit(job)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stops the pool and joins every worker. Queued jobs that no worker
    /// picked up before the flag was observed are dropped.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::Relaxed);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    queue: JobQueue,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    ctx: WorkerContext,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match queue.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing recording {}", worker_id, job.recording_id);
                if let Some(result) = process_job(&job, &ctx) {
                    if result_sender.send(result).is_err() {
                        error!("Worker {} failed to send result", worker_id);
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Processes one job end to end. Returns `None` when the claim was lost
/// to another worker (or the job already completed), which is not an
/// observable outcome.
///
/// The job row is committed before the result is emitted, so an observer
/// that sees a result can trust the database to agree with it.
fn process_job(job: &Job, ctx: &WorkerContext) -> Option<JobResult> {
    let recording = match recording_repo::find_by_id(&ctx.db, &job.recording_id) {
        Ok(Some(recording)) => recording,
        Ok(None) => {
            warn!("Recording {} vanished before processing", job.recording_id);
            return Some(JobResult::failure(
                job,
                format!("recording {} not found", job.recording_id),
            ));
        }
        Err(e) => {
            error!("Failed to load recording {}: {}", job.recording_id, e);
            return Some(JobResult::failure(job, e.to_string()));
        }
    };

    match job_repo::claim(&ctx.db, &job.recording_id) {
        Ok(true) => {}
        Ok(false) => {
            debug!(
                "Recording {} already claimed or completed, skipping",
                job.recording_id
            );
            return None;
        }
        Err(e) => {
            error!("Failed to claim job for {}: {}", job.recording_id, e);
            return Some(JobResult::failure(job, e.to_string()));
        }
    }

    let project_id = recording.project_id.clone();
    let started = Instant::now();

    let result = run_with_deadline(job, recording, ctx);
    let elapsed = started.elapsed().as_secs_f64();

    let persisted = persist_outcome(&result, elapsed, ctx);
    if let Err(e) = persisted {
        error!(
            "Failed to persist outcome for {}: {}",
            job.recording_id, e
        );
        return Some(JobResult::failure(job, e.to_string()));
    }

    // Recording metadata or job state changed; cached reads are stale.
    ctx.cache.invalidate_project(&project_id);
    ctx.cache.invalidate_recording(&job.recording_id);

    Some(result)
}

/// Runs the pipeline on a helper thread and waits up to the soft
/// deadline. A deadline hit abandons the helper (it finishes into a
/// closed channel) and reports the reserved timeout message.
fn run_with_deadline(
    job: &Job,
    recording: recording_repo::RecordingRow,
    ctx: &WorkerContext,
) -> JobResult {
    let (tx, rx) = bounded::<JobResult>(1);
    let pipeline = Arc::clone(&ctx.pipeline);
    let progress_sender = ctx.progress_sender.clone();
    let helper_job = job.clone();

    thread::spawn(move || {
        let pctx = PipelineContext::new(helper_job.clone(), recording);
        let result = match progress_sender {
            Some(sender) => {
                let progress = BroadcastProgress::new(&helper_job.recording_id, sender);
                progress.report(ProgressEvent::Stage {
                    stage: Stage::Queued,
                    message: "Job picked up".to_string(),
                });
                pipeline.run(pctx, &progress)
            }
            None => pipeline.run(pctx, &NoopProgress),
        };
        let _ = tx.send(result);
    });

    match rx.recv_timeout(ctx.soft_deadline) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "Recording {} exceeded soft deadline of {:?}",
                job.recording_id, ctx.soft_deadline
            );
            if let Some(ref sender) = ctx.progress_sender {
                let progress = BroadcastProgress::new(&job.recording_id, Arc::clone(sender));
                progress.report(ProgressEvent::Failed {
                    error: TIMEOUT_ERROR.to_string(),
                });
            }
            JobResult::failure(job, TIMEOUT_ERROR.to_string())
        }
        Err(RecvTimeoutError::Disconnected) => {
            error!("Pipeline thread for {} panicked", job.recording_id);
            JobResult::failure(job, "pipeline thread panicked".to_string())
        }
    }
}

fn persist_outcome(
    result: &JobResult,
    elapsed: f64,
    ctx: &WorkerContext,
) -> Result<(), crate::db::DatabaseError> {
    if result.success {
        job_repo::mark_completed(
            &ctx.db,
            &result.recording_id,
            result.artifact_path.as_deref().unwrap_or_default(),
            result.width.unwrap_or_default(),
            result.height.unwrap_or_default(),
            elapsed,
            result.parameters.as_deref().unwrap_or("{}"),
        )?;
        if let (Some(duration), Some(sample_rate)) = (result.duration_seconds, result.sample_rate) {
            recording_repo::update_audio_metadata(
                &ctx.db,
                &result.recording_id,
                duration,
                sample_rate,
            )?;
        }
    } else {
        job_repo::mark_failed(
            &ctx.db,
            &result.recording_id,
            result.error.as_deref().unwrap_or("unknown error"),
            Some(elapsed),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MokaBackend;
    use crate::db::job_repo::JobStatus;
    use crate::pipeline::ProgressReporter;

    fn test_cache() -> Arc<RecordingCache> {
        Arc::new(RecordingCache::new(
            Arc::new(MokaBackend::new(64)),
            Duration::from_secs(60),
            Duration::from_secs(60),
        ))
    }

    fn settings(workers: usize, deadline: Duration) -> WorkerSettings {
        WorkerSettings {
            worker_count: workers,
            queue_capacity: 16,
            soft_deadline: deadline,
        }
    }

    fn insert_recording(db: &Database, id: &str) {
        recording_repo::insert(
            db,
            &recording_repo::RecordingRow {
                id: id.to_string(),
                project_id: "p1".to_string(),
                filename: "tone.wav".to_string(),
                storage_path: format!("p1/{id}/tone.wav"),
                duration_seconds: None,
                sample_rate: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        job_repo::ensure_pending(db, id).unwrap();
    }

    /// Pipeline double producing a canned result.
    struct FixedPipeline {
        succeed: bool,
    }

    impl JobPipeline for FixedPipeline {
        fn run(&self, ctx: PipelineContext, _progress: &dyn ProgressReporter) -> JobResult {
            if self.succeed {
                JobResult::success(
                    &ctx.job,
                    format!("{}/spectrogram.png", ctx.job.recording_id),
                    1600,
                    400,
                    "{}".to_string(),
                    8.0,
                    44100,
                )
            } else {
                JobResult::failure(&ctx.job, "decode failed".to_string())
            }
        }
    }

    /// Pipeline double that blocks past any reasonable deadline.
    struct StalledPipeline;

    impl JobPipeline for StalledPipeline {
        fn run(&self, ctx: PipelineContext, _progress: &dyn ProgressReporter) -> JobResult {
            thread::sleep(Duration::from_secs(5));
            JobResult::failure(&ctx.job, "never observed".to_string())
        }
    }

    #[test]
    fn test_successful_job_commits_before_result() {
        let db = Database::open_in_memory().unwrap();
        insert_recording(&db, "r1");

        let pool = WorkerPool::new(
            db.clone(),
            Arc::new(FixedPipeline { succeed: true }),
            test_cache(),
            settings(1, Duration::from_secs(10)),
            None,
        );
        pool.submit(Job::interactive("r1")).unwrap();

        let result = pool.recv_result().unwrap();
        assert!(result.success);

        // Ack-late: the row is already completed when the result arrives.
        let row = job_repo::find_by_recording(&db, "r1").unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
        assert_eq!(row.artifact_path.as_deref(), Some("r1/spectrogram.png"));
        assert_eq!(row.width, Some(1600));
        assert!(row.processing_time_seconds.is_some());

        // Audio metadata was back-filled.
        let recording = recording_repo::find_by_id(&db, "r1").unwrap().unwrap();
        assert_eq!(recording.sample_rate, Some(44100));

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_failed_job_records_error() {
        let db = Database::open_in_memory().unwrap();
        insert_recording(&db, "r1");

        let pool = WorkerPool::new(
            db.clone(),
            Arc::new(FixedPipeline { succeed: false }),
            test_cache(),
            settings(1, Duration::from_secs(10)),
            None,
        );
        pool.submit(Job::interactive("r1")).unwrap();

        let result = pool.recv_result().unwrap();
        assert!(!result.success);

        let row = job_repo::find_by_recording(&db, "r1").unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("decode failed"));
        assert!(row.artifact_path.is_none());

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_soft_deadline_fails_job_with_timeout_message() {
        let db = Database::open_in_memory().unwrap();
        insert_recording(&db, "r1");

        let pool = WorkerPool::new(
            db.clone(),
            Arc::new(StalledPipeline),
            test_cache(),
            settings(1, Duration::from_millis(50)),
            None,
        );
        pool.submit(Job::interactive("r1")).unwrap();

        let result = pool.recv_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(TIMEOUT_ERROR));

        let row = job_repo::find_by_recording(&db, "r1").unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some(TIMEOUT_ERROR));

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_missing_recording_reports_failure() {
        let db = Database::open_in_memory().unwrap();

        let pool = WorkerPool::new(
            db,
            Arc::new(FixedPipeline { succeed: true }),
            test_cache(),
            settings(1, Duration::from_secs(10)),
            None,
        );
        pool.submit(Job::interactive("ghost")).unwrap();

        let result = pool.recv_result().unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("ghost"));

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_completed_job_is_not_reprocessed() {
        let db = Database::open_in_memory().unwrap();
        insert_recording(&db, "r1");
        job_repo::claim(&db, "r1").unwrap();
        job_repo::mark_completed(&db, "r1", "r1/spectrogram.png", 800, 400, 1.0, "{}").unwrap();

        let pool = WorkerPool::new(
            db.clone(),
            Arc::new(FixedPipeline { succeed: false }),
            test_cache(),
            settings(1, Duration::from_secs(10)),
            None,
        );
        pool.submit(Job::interactive("r1")).unwrap();

        // The claim fails on the completed row, so no result is emitted
        // and the row is untouched.
        assert!(pool.try_recv_result().is_none());
        thread::sleep(Duration::from_millis(300));
        assert!(pool.try_recv_result().is_none());

        let row = job_repo::find_by_recording(&db, "r1").unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);

        pool.shutdown();
        pool.wait();
    }
}
