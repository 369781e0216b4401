/// Scheduling lane for a job. Interactive jobs come from uploads and
/// explicit regeneration requests; bulk jobs from back-fill sweeps.
/// Workers always drain interactive work first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Interactive,
    Bulk,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub recording_id: String,
    pub priority: Priority,
}

impl Job {
    pub fn interactive(recording_id: &str) -> Self {
        Self {
            recording_id: recording_id.to_string(),
            priority: Priority::Interactive,
        }
    }

    pub fn bulk(recording_id: &str) -> Self {
        Self {
            recording_id: recording_id.to_string(),
            priority: Priority::Bulk,
        }
    }
}

/// Outcome of one pipeline run. The worker persists this to the job row
/// before emitting it to any observer.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub recording_id: String,
    pub success: bool,
    pub artifact_path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JSON snapshot of the render parameters actually used.
    pub parameters: Option<String>,
    /// Decoded audio metadata, back-filled onto the recording row.
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(
        job: &Job,
        artifact_path: String,
        width: u32,
        height: u32,
        parameters: String,
        duration_seconds: f64,
        sample_rate: u32,
    ) -> Self {
        Self {
            recording_id: job.recording_id.clone(),
            success: true,
            artifact_path: Some(artifact_path),
            width: Some(width),
            height: Some(height),
            parameters: Some(parameters),
            duration_seconds: Some(duration_seconds),
            sample_rate: Some(sample_rate),
            error: None,
        }
    }

    pub fn failure(job: &Job, error: String) -> Self {
        Self {
            recording_id: job.recording_id.clone(),
            success: false,
            artifact_path: None,
            width: None,
            height: None,
            parameters: None,
            duration_seconds: None,
            sample_rate: None,
            error: Some(error),
        }
    }
}
