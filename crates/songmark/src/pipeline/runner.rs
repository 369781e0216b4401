use std::sync::Arc;

use tracing::info_span;

use crate::audio;
use crate::spectrogram::{self, RenderParams};
use crate::store::{self, ObjectStore};
use crate::worker::job::JobResult;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter, Stage};

/// Runs one recording through download, decode, render and upload.
pub trait JobPipeline: Send + Sync {
    fn run(&self, ctx: PipelineContext, progress: &dyn ProgressReporter) -> JobResult;
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    store: Arc<dyn ObjectStore>,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// Object key of a recording's rendered spectrogram.
    pub fn artifact_key(recording_id: &str) -> String {
        format!("{recording_id}/spectrogram.png")
    }

    fn run_inner(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        // Step 1: Download raw audio
        {
            let _step = info_span!("download_audio").entered();
            progress.report(ProgressEvent::Stage {
                stage: Stage::DownloadingAudio,
                message: "Fetching audio from storage...".to_string(),
            });
            self.step_download(ctx)?;
        }

        // Step 2: Decode
        {
            let _step = info_span!("decode_audio").entered();
            progress.report(ProgressEvent::Stage {
                stage: Stage::Decoding,
                message: "Decoding audio...".to_string(),
            });
            self.step_decode(ctx)?;
        }

        // Step 3: Render
        {
            let _step = info_span!("render_spectrogram").entered();
            progress.report(ProgressEvent::Stage {
                stage: Stage::Rendering,
                message: "Rendering spectrogram...".to_string(),
            });
            self.step_render(ctx)?;
        }

        // Step 4: Upload artifact
        {
            let _step = info_span!("upload_artifact").entered();
            progress.report(ProgressEvent::Stage {
                stage: Stage::Uploading,
                message: "Uploading spectrogram...".to_string(),
            });
            self.step_upload(ctx)?;
        }

        Ok(())
    }

    fn step_download(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let bytes = store::read_all(
            self.store.as_ref(),
            &self.config.recordings_bucket,
            &ctx.recording.storage_path,
        )
        .map_err(PipelineError::Download)?;
        ctx.raw_audio = Some(bytes);
        Ok(())
    }

    fn step_decode(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let raw = ctx.raw_audio.as_ref().expect("step 1 completed");
        ctx.decoded = Some(audio::decode_wav(raw)?);
        Ok(())
    }

    fn step_render(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let decoded = ctx.decoded.as_ref().expect("step 2 completed");
        let params = RenderParams {
            target_width: self.config.target_width(decoded.duration_seconds),
            target_height: self.config.height,
            n_fft: self.config.n_fft,
            hop_length: self.config.hop_length,
            max_frequency: self.config.max_frequency,
        };
        ctx.rendered = Some(spectrogram::render(
            &decoded.samples,
            decoded.sample_rate,
            &params,
        )?);
        Ok(())
    }

    fn step_upload(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let rendered = ctx.rendered.as_ref().expect("step 3 completed");
        let key = Self::artifact_key(&ctx.job.recording_id);
        self.store
            .put(
                &self.config.spectrograms_bucket,
                &key,
                &rendered.png,
                "image/png",
            )
            .map_err(PipelineError::Upload)?;
        ctx.artifact_path = Some(key);
        Ok(())
    }
}

impl JobPipeline for Pipeline {
    fn run(&self, mut ctx: PipelineContext, progress: &dyn ProgressReporter) -> JobResult {
        let _pipeline_span = info_span!("pipeline",
            recording_id = %ctx.job.recording_id,
            filename = %ctx.recording.filename,
        )
        .entered();

        if let Err(e) = self.run_inner(&mut ctx, progress) {
            let err_msg = e.to_string();
            progress.report(ProgressEvent::Failed {
                error: err_msg.clone(),
            });
            return JobResult::failure(&ctx.job, err_msg);
        }

        let rendered = ctx.rendered.as_ref().expect("step 3 completed");
        let decoded = ctx.decoded.as_ref().expect("step 2 completed");
        let artifact_path = ctx.artifact_path.clone().expect("step 4 completed");

        let parameters = serde_json::to_string(&rendered.snapshot).unwrap_or_default();

        progress.report(ProgressEvent::Completed {
            artifact_path: artifact_path.clone(),
            width: rendered.width,
            height: rendered.height,
        });

        JobResult::success(
            &ctx.job,
            artifact_path,
            rendered.width,
            rendered.height,
            parameters,
            decoded.duration_seconds,
            decoded.sample_rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::recording_repo::RecordingRow;
    use crate::pipeline::progress::NoopProgress;
    use crate::store::FsObjectStore;
    use crate::worker::job::Job;
    use std::io::Cursor;

    fn test_config() -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            recordings_bucket: "recordings".to_string(),
            spectrograms_bucket: "spectrograms".to_string(),
            pixels_per_second: 200.0,
            min_width: 800,
            max_width: 3200,
            height: 400,
            n_fft: 2048,
            hop_length: None,
            max_frequency: None,
        })
    }

    fn wav_bytes(seconds: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
            let total = (seconds * sample_rate as f64) as usize;
            for i in 0..total {
                let t = i as f32 / sample_rate as f32;
                let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
                writer.write_sample((sample * i16::MAX as f32 * 0.5) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        buf.into_inner()
    }

    fn context(recording_id: &str, storage_path: &str) -> PipelineContext {
        PipelineContext::new(
            Job::interactive(recording_id),
            RecordingRow {
                id: recording_id.to_string(),
                project_id: "p1".to_string(),
                filename: "tone.wav".to_string(),
                storage_path: storage_path.to_string(),
                duration_seconds: None,
                sample_rate: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
    }

    #[test]
    fn test_run_produces_artifact_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(dir.path()));
        store
            .put("recordings", "p1/r1/tone.wav", &wav_bytes(2.0, 22050), "audio/wav")
            .unwrap();

        let pipeline = Pipeline::new(test_config(), Arc::clone(&store));
        let result = pipeline.run(context("r1", "p1/r1/tone.wav"), &NoopProgress);

        assert!(result.success, "pipeline failed: {:?}", result.error);
        assert_eq!(result.artifact_path.as_deref(), Some("r1/spectrogram.png"));
        // 2s at 200 px/s is below the 800px floor.
        assert_eq!(result.width, Some(800));
        assert_eq!(result.height, Some(400));
        assert_eq!(result.sample_rate, Some(22050));
        assert!((result.duration_seconds.unwrap() - 2.0).abs() < 0.01);

        // The PNG landed in the spectrograms bucket and decodes.
        let png = store::read_all(store.as_ref(), "spectrograms", "r1/spectrogram.png").unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), 800);
        assert_eq!(img.height(), 400);

        // The snapshot records the parameters actually used.
        let snapshot: crate::spectrogram::ParameterSnapshot =
            serde_json::from_str(&result.parameters.unwrap()).unwrap();
        assert_eq!(snapshot.n_fft, 2048);
        assert_eq!(snapshot.sample_rate, 22050);
        assert_eq!(snapshot.max_frequency, 11025);
    }

    #[test]
    fn test_missing_audio_fails_with_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(dir.path()));

        let pipeline = Pipeline::new(test_config(), store);
        let result = pipeline.run(context("r1", "p1/r1/missing.wav"), &NoopProgress);

        assert!(!result.success);
        assert!(result.error.unwrap().contains("download"));
    }

    #[test]
    fn test_corrupt_audio_fails_with_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(dir.path()));
        store
            .put("recordings", "p1/r1/bad.wav", b"definitely not a wav", "audio/wav")
            .unwrap();

        let pipeline = Pipeline::new(test_config(), store);
        let result = pipeline.run(context("r1", "p1/r1/bad.wav"), &NoopProgress);

        assert!(!result.success);
        assert!(result.error.unwrap().to_lowercase().contains("decode"));
        assert!(result.artifact_path.is_none());
    }
}
