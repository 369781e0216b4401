pub mod app;
pub mod audio;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod spectrogram;
pub mod store;
pub mod worker;

pub use app::App;
pub use cache::{MokaBackend, RecordingCache};
pub use config::{load_config, SongmarkConfig};
pub use error::{
    ConfigError, DatabaseError, DecodeError, RenderError, Result, SongmarkError, StoreError,
    WorkerError,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext};
pub use service::{ArtifactState, JobStatusView, RecordingService};
pub use store::{FsObjectStore, ObjectStore, RetryPolicy, RetryingStore};
pub use worker::{EnqueueOutcome, Orchestrator, WorkerPool, WorkerSettings};
