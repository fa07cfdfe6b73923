// Transcode pipeline - fetch, stage, convert, assemble
//
// Each stage is its own method returning a typed failure; `run` awaits them
// strictly in order. Nothing reaches the library unless all four succeed.

use std::sync::Arc;

use parking_lot::Mutex;

use super::errors::PreviewError;
use super::format_selector::FormatSelector;
use super::models::{
    ArtifactId, AudioBlob, AudioFormat, EngineLogRecord, PipelineProgress, PipelineStage,
    PreviewArtifact, VideoInfo, TARGET_BITRATE_KBPS, TARGET_EXTENSION,
};
use super::traits::{EngineLogListener, PresentationHooks, Relay, TranscodeEngine};

const INPUT_STEM: &str = "input";
const OUTPUT_STEM: &str = "output";
const TARGET_CODEC: &str = "libmp3lame";

/// Everything a run needs, captured before the first await
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub snapshot: Arc<VideoInfo>,
    pub format: AudioFormat,
}

impl PreviewRequest {
    /// Idle -> Fetching precondition: a current VideoInfo and a valid selection
    pub fn from_selection(selector: &FormatSelector) -> Result<Self, PreviewError> {
        let snapshot = selector
            .current()
            .cloned()
            .ok_or_else(|| PreviewError::Selection("No media has been resolved yet".to_string()))?;

        if snapshot.audio_formats.is_empty() {
            return Err(PreviewError::Selection(
                "No audio formats available for this media".to_string(),
            ));
        }

        let format = selector
            .selected_format()
            .cloned()
            .ok_or_else(|| PreviewError::Selection("No audio format selected".to_string()))?;

        Ok(Self { snapshot, format })
    }
}

/// Input file registered with the transcoder
#[derive(Debug, Clone, PartialEq)]
pub struct StagedInput {
    pub name: String,
    pub size: usize,
}

/// Transcoder output that is ready to be read back
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedOutput {
    pub name: String,
    pub log: Vec<String>,
}

/// Forwards transcoder log records to tracing
pub struct TracingLogListener;

impl EngineLogListener for TracingLogListener {
    fn on_log(&self, record: &EngineLogRecord) {
        tracing::debug!("[Transcoder] {:?}: {}", record.stream, record.line);
    }
}

pub struct TranscodePipeline {
    relay: Arc<dyn Relay>,
    engine: Arc<dyn TranscodeEngine>,
    stage: Mutex<PipelineStage>,
}

impl TranscodePipeline {
    pub fn new(relay: Arc<dyn Relay>, engine: Arc<dyn TranscodeEngine>) -> Self {
        Self {
            relay,
            engine,
            stage: Mutex::new(PipelineStage::Idle),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.lock()
    }

    /// Input token keeps the source container extension so the transcoder
    /// can probe it
    pub fn input_name(extension: &str) -> String {
        let ext: String = extension
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if ext.is_empty() {
            INPUT_STEM.to_string()
        } else {
            format!("{}.{}", INPUT_STEM, ext)
        }
    }

    pub fn output_name() -> String {
        format!("{}.{}", OUTPUT_STEM, TARGET_EXTENSION)
    }

    /// Fixed command: decode, drop any video, re-encode at constant 192k
    pub fn transcode_args(input: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            TARGET_CODEC.to_string(),
            "-b:a".to_string(),
            format!("{}k", TARGET_BITRATE_KBPS),
            Self::output_name(),
        ]
    }

    /// Stage 1: download the full payload through the relay
    pub async fn fetch(&self, format: &AudioFormat) -> Result<Vec<u8>, PreviewError> {
        self.set_stage(PipelineStage::Fetching);
        if format.source_url.is_empty() {
            return Err(PreviewError::Fetch(format!(
                "Format {} has no source URL",
                format.format_id
            )));
        }

        let bytes = self.relay.fetch(&format.source_url).await.map_err(|e| match e {
            PreviewError::Fetch(_) => e,
            other => PreviewError::Fetch(other.to_string()),
        })?;
        tracing::info!(
            "[Pipeline] Fetched {} bytes for format {} via {}",
            bytes.len(),
            format.format_id,
            self.relay.name()
        );
        Ok(bytes)
    }

    /// Stage 2: write the payload into the transcoder's namespace
    pub async fn stage_input(
        &self,
        format: &AudioFormat,
        bytes: &[u8],
    ) -> Result<StagedInput, PreviewError> {
        self.set_stage(PipelineStage::Staging);
        let name = Self::input_name(&format.extension);
        self.engine
            .write_input(&name, bytes)
            .await
            .map_err(into_engine_error)?;
        tracing::debug!("[Pipeline] Staged {} ({} bytes)", name, bytes.len());
        Ok(StagedInput { name, size: bytes.len() })
    }

    /// Stage 3: run the fixed conversion
    pub async fn convert(&self, staged: &StagedInput) -> Result<ConvertedOutput, PreviewError> {
        self.set_stage(PipelineStage::Converting);
        let args = Self::transcode_args(&staged.name);
        tracing::debug!("[Pipeline] {} {}", self.engine.name(), args.join(" "));

        let outcome = self.engine.execute(&args).await.map_err(|e| match e {
            PreviewError::Transcode { .. } => e,
            other => PreviewError::Transcode {
                message: other.to_string(),
                log: Vec::new(),
            },
        })?;

        let log = outcome.log_lines();
        if !outcome.success() {
            let message = log
                .iter()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| format!("exit code {}: {}", outcome.exit_code, l.trim()))
                .unwrap_or_else(|| format!("exit code {}", outcome.exit_code));
            return Err(PreviewError::Transcode { message, log });
        }

        Ok(ConvertedOutput { name: Self::output_name(), log })
    }

    /// Stage 4: read back the result and build the artifact from the snapshot
    pub async fn assemble(
        &self,
        output: &ConvertedOutput,
        snapshot: &VideoInfo,
    ) -> Result<PreviewArtifact, PreviewError> {
        let bytes = self
            .engine
            .read_output(&output.name)
            .await
            .map_err(into_engine_error)?;
        if bytes.is_empty() {
            return Err(PreviewError::Transcode {
                message: "transcoder produced an empty file".to_string(),
                log: output.log.clone(),
            });
        }

        self.set_stage(PipelineStage::Ready);
        Ok(PreviewArtifact {
            id: ArtifactId::next(),
            title: snapshot.title.clone(),
            artist: snapshot.artist.clone(),
            thumbnail: snapshot.thumbnail.clone(),
            audio: AudioBlob::mp3(bytes),
        })
    }

    /// Run all four stages in order, reporting the 50% and 100% checkpoints
    pub async fn run(
        &self,
        request: &PreviewRequest,
        hooks: &dyn PresentationHooks,
    ) -> Result<PreviewArtifact, PreviewError> {
        tracing::info!(
            "[Pipeline] Preview '{}' from format {} ({})",
            request.snapshot.title,
            request.format.format_id,
            request.format.extension
        );
        hooks.progress(Some(checkpoint(0.0, PipelineStage::Fetching, "Downloading audio...")));

        let result = self.run_stages(request, hooks).await;

        // Scratch names are shared by every run, clear them either way
        let input = Self::input_name(&request.format.extension);
        for name in [input, Self::output_name()] {
            if let Err(e) = self.engine.remove(&name).await {
                tracing::warn!("[Pipeline] Could not remove {}: {}", name, e);
            }
        }
        self.set_stage(PipelineStage::Idle);

        match &result {
            Ok(artifact) => tracing::info!(
                "[Pipeline] ✓ {} ready ({} bytes)",
                artifact.id,
                artifact.audio.len()
            ),
            Err(e) => tracing::warn!("[Pipeline] ✗ Run failed: {}", e),
        }
        result
    }

    async fn run_stages(
        &self,
        request: &PreviewRequest,
        hooks: &dyn PresentationHooks,
    ) -> Result<PreviewArtifact, PreviewError> {
        let bytes = self.fetch(&request.format).await?;
        hooks.progress(Some(checkpoint(50.0, PipelineStage::Staging, "Converting to MP3...")));

        let staged = self.stage_input(&request.format, &bytes).await?;
        drop(bytes);
        let output = self.convert(&staged).await?;
        let artifact = self.assemble(&output, &request.snapshot).await?;

        hooks.progress(Some(checkpoint(100.0, PipelineStage::Ready, "Preview ready")));
        Ok(artifact)
    }

    fn set_stage(&self, stage: PipelineStage) {
        *self.stage.lock() = stage;
    }
}

fn checkpoint(percent: f32, stage: PipelineStage, status: &str) -> PipelineProgress {
    PipelineProgress {
        percent,
        stage,
        status: status.to_string(),
    }
}

fn into_engine_error(e: PreviewError) -> PreviewError {
    match e {
        PreviewError::Engine(_) => e,
        other => PreviewError::Engine(other.to_string()),
    }
}
