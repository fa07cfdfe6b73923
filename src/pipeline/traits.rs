// Collaborator contracts and observer hooks

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::PreviewError;
use super::models::{
    Control, EngineLogRecord, ExecOutcome, Notice, PipelineProgress, PreviewArtifact,
    RawVideoInfo, VideoInfo,
};

/// Metadata/URL-resolution engine
#[async_trait]
pub trait MetadataEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Start the interpreter that hosts the resolution package
    async fn start(&self) -> Result<(), PreviewError>;

    /// Make the resolution package available; returns its version
    async fn install_package(&self) -> Result<String, PreviewError>;

    /// Metadata only, never downloads the stream itself
    async fn resolve(&self, url: &str) -> Result<RawVideoInfo, PreviewError>;
}

/// Transcoding engine with its own file namespace
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Instantiate and load the engine; returns its version
    async fn load(&self) -> Result<String, PreviewError>;

    async fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), PreviewError>;

    /// Run with an argv that refers to files by their names in the namespace
    async fn execute(&self, args: &[String]) -> Result<ExecOutcome, PreviewError>;

    async fn read_output(&self, name: &str) -> Result<Vec<u8>, PreviewError>;

    /// Drop a file from the namespace; missing files are not an error
    async fn remove(&self, _name: &str) -> Result<(), PreviewError> {
        Ok(())
    }

    /// Register a listener for structured log records
    fn subscribe_logs(&self, _listener: Arc<dyn EngineLogListener>) {}
}

/// Pass-through fetch of a URL that may be subject to cross-origin rules
#[async_trait]
pub trait Relay: Send + Sync {
    fn name(&self) -> &'static str;

    /// Exact bytes at `url`, or `PreviewError::Fetch`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PreviewError>;
}

/// Receives the transcoder's log stream
pub trait EngineLogListener: Send + Sync {
    fn on_log(&self, record: &EngineLogRecord);
}

/// Hooks the presentation layer implements; every method is optional
pub trait PresentationHooks: Send + Sync {
    fn notify(&self, _notice: Notice) {}

    /// `None` hides the progress indicator
    fn progress(&self, _progress: Option<PipelineProgress>) {}

    fn control_busy(&self, _control: Control, _busy: bool) {}

    /// `None` hides the detail panel
    fn details_changed(&self, _info: Option<&VideoInfo>) {}

    fn url_cleared(&self) {}

    fn library_changed(&self, _entries: &[PreviewArtifact]) {}
}

/// Hooks that ignore everything
pub struct NoopHooks;

impl PresentationHooks for NoopHooks {}
