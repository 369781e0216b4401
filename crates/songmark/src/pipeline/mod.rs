//! Staged spectrogram pipeline: download, decode, render, upload.
//!
//! The runner owns only the computation; persisting the job outcome is
//! the worker's responsibility, so a crash between stages never leaves
//! a job row claiming work that was not stored.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, TIMEOUT_ERROR};
pub use progress::{
    BroadcastProgress, JobProgressEvent, NoopProgress, ProgressEvent, ProgressReporter, Stage,
};
pub use runner::{JobPipeline, Pipeline};
