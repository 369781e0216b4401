//! Process composition: a validated config in, a running stack out.
//!
//! `App::from_config` is the only place the concrete backends are
//! chosen and the configured knobs (retry policy, cache TTLs, worker
//! sizing, bucket names) are threaded into the subsystems. Everything
//! downstream talks to traits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::sync::broadcast;

use crate::cache::{MokaBackend, RecordingCache};
use crate::config::SongmarkConfig;
use crate::db::{self, job_repo, Database};
use crate::error::{ConfigError, Result};
use crate::pipeline::{JobProgressEvent, Pipeline, PipelineConfig};
use crate::service::RecordingService;
use crate::store::{FsObjectStore, ObjectStore, RetryPolicy, RetryingStore};
use crate::worker::{Orchestrator, WorkerPool, WorkerSettings};

/// The assembled application: database, object store, cache, worker
/// pool and the service facade, all built from one config.
pub struct App {
    pub config: SongmarkConfig,
    pub db: Database,
    pub store: Arc<dyn ObjectStore>,
    pub cache: Arc<RecordingCache>,
    pub pool: WorkerPool,
    pub service: RecordingService,
    progress_sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl App {
    /// Builds and starts the full stack.
    ///
    /// Jobs left in `processing` by a previous run are reset to
    /// `pending` before any worker starts, so an interrupted render can
    /// be re-enqueued instead of looking in flight forever.
    pub fn from_config(config: SongmarkConfig) -> Result<Self> {
        let database_path = match &config.database_path {
            Some(path) => PathBuf::from(path),
            None => db::default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "no database_path configured and no home directory to default to"
                    .to_string(),
            })?,
        };
        let db = Database::open(&database_path)?;

        let recovered = job_repo::recover_stale_processing(&db)?;
        if recovered > 0 {
            info!("Reset {recovered} spectrogram jobs interrupted by a previous shutdown");
        }
        let backlog = job_repo::count_by_status(&db, job_repo::JobStatus::Pending)?;
        if backlog > 0 {
            info!("{backlog} spectrogram jobs pending at startup");
        }

        let storage_root = PathBuf::from(&config.storage.root);
        let policy = RetryPolicy {
            max_attempts: config.storage.retry_attempts,
            base_delay: Duration::from_millis(config.storage.retry_base_delay_ms),
        };
        let store: Arc<dyn ObjectStore> = Arc::new(RetryingStore::new(
            Box::new(move || {
                Arc::new(FsObjectStore::new(&storage_root)) as Arc<dyn ObjectStore>
            }),
            policy,
        ));
        store.ensure_bucket(&config.storage.recordings_bucket)?;
        store.ensure_bucket(&config.storage.spectrograms_bucket)?;

        let cache = Arc::new(RecordingCache::new(
            Arc::new(MokaBackend::new(config.cache.capacity)),
            Duration::from_secs(config.cache.listing_ttl_secs),
            Duration::from_secs(config.cache.detail_ttl_secs),
        ));

        let (progress_tx, _) = broadcast::channel(256);
        let progress_sender = Arc::new(progress_tx);

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PipelineConfig::from_config(&config)),
            Arc::clone(&store),
        ));

        let pool = WorkerPool::new(
            db.clone(),
            pipeline,
            Arc::clone(&cache),
            WorkerSettings {
                worker_count: config.workers.count,
                queue_capacity: config.workers.queue_capacity,
                soft_deadline: Duration::from_secs(config.workers.soft_deadline_secs),
            },
            Some(Arc::clone(&progress_sender)),
        );

        let orchestrator = Orchestrator::new(db.clone(), pool.queue());
        let service = RecordingService::new(
            db.clone(),
            Arc::clone(&store),
            orchestrator,
            Arc::clone(&cache),
            config.storage.recordings_bucket.clone(),
            config.storage.spectrograms_bucket.clone(),
        );

        Ok(Self {
            config,
            db,
            store,
            cache,
            pool,
            service,
            progress_sender,
        })
    }

    /// Live feed of per-job stage events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.progress_sender.subscribe()
    }

    /// Stops the workers and joins them. Jobs still only queued stay
    /// `pending` in the database and are recovered on the next start.
    pub fn shutdown(self) {
        self.pool.shutdown();
        self.pool.wait();
    }
}
