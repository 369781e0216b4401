use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Stage of spectrogram generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    DownloadingAudio,
    Decoding,
    Rendering,
    Uploading,
    Completed,
    Failed,
}

impl Stage {
    /// Coarse completion estimate, monotonic across the stage order.
    pub fn percent(self) -> u8 {
        match self {
            Stage::Queued => 0,
            Stage::DownloadingAudio => 10,
            Stage::Decoding => 25,
            Stage::Rendering => 45,
            Stage::Uploading => 80,
            Stage::Completed => 100,
            Stage::Failed => 100,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Queued => write!(f, "Queued"),
            Stage::DownloadingAudio => write!(f, "Downloading audio"),
            Stage::Decoding => write!(f, "Decoding"),
            Stage::Rendering => write!(f, "Rendering"),
            Stage::Uploading => write!(f, "Uploading"),
            Stage::Completed => write!(f, "Completed"),
            Stage::Failed => write!(f, "Failed"),
        }
    }
}

/// Events emitted by the pipeline during processing.
pub enum ProgressEvent {
    Stage { stage: Stage, message: String },
    Completed { artifact_path: String, width: u32, height: u32 },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and bulk regeneration.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress event for one recording's job, serialized for subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub recording_id: String,
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(recording_id: &str, stage: Stage, message: &str) -> Self {
        Self {
            recording_id: recording_id.to_string(),
            stage,
            percent: stage.percent(),
            message: message.to_string(),
            timestamp: Utc::now(),
            artifact_path: None,
            error: None,
        }
    }
}

/// Bridges pipeline events into a tokio broadcast channel so status
/// surfaces can stream them. Send failures mean nobody is listening,
/// which is fine.
pub struct BroadcastProgress {
    recording_id: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(recording_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            recording_id: recording_id.to_string(),
            sender,
        }
    }

    fn send(&self, event: JobProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { stage, message } => {
                self.send(JobProgressEvent::new(&self.recording_id, stage, &message));
            }
            ProgressEvent::Completed {
                artifact_path,
                width,
                height,
            } => {
                let mut out = JobProgressEvent::new(
                    &self.recording_id,
                    Stage::Completed,
                    &format!("Spectrogram ready ({width}x{height})"),
                );
                out.artifact_path = Some(artifact_path);
                self.send(out);
            }
            ProgressEvent::Failed { error } => {
                let mut out =
                    JobProgressEvent::new(&self.recording_id, Stage::Failed, "Generation failed");
                out.error = Some(error);
                self.send(out);
            }
        }
    }
}
