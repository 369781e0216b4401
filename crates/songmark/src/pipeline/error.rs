use thiserror::Error;

/// Reserved error message written to jobs killed by the soft deadline.
/// Status surfaces distinguish timeouts from real pipeline failures by
/// matching it exactly.
pub const TIMEOUT_ERROR: &str = "execution timeout";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Audio download failed: {0}")]
    Download(crate::error::StoreError),

    #[error("Audio decode failed: {0}")]
    Decode(#[from] crate::error::DecodeError),

    #[error("Spectrogram render failed: {0}")]
    Render(#[from] crate::error::RenderError),

    #[error("Artifact upload failed: {0}")]
    Upload(crate::error::StoreError),
}
