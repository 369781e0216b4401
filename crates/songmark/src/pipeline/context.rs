use crate::audio::DecodedAudio;
use crate::db::recording_repo::RecordingRow;
use crate::spectrogram::RenderedImage;
use crate::worker::job::Job;

pub struct PipelineContext {
    // Input
    pub job: Job,
    pub recording: RecordingRow,

    // Step 1 result — guaranteed Some after step_download
    pub raw_audio: Option<Vec<u8>>,

    // Step 2 result — guaranteed Some after step_decode
    pub decoded: Option<DecodedAudio>,

    // Step 3 result — guaranteed Some after step_render
    pub rendered: Option<RenderedImage>,

    // Step 4 result — object key of the uploaded PNG
    pub artifact_path: Option<String>,
}

impl PipelineContext {
    pub fn new(job: Job, recording: RecordingRow) -> Self {
        Self {
            job,
            recording,
            raw_audio: None,
            decoded: None,
            rendered: None,
            artifact_path: None,
        }
    }
}
