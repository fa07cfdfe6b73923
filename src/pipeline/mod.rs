// Extraction-to-preview pipeline: engine bootstrap, resolution, format
// selection, transcoding, the preview library and playback coordination.

pub mod bootstrap;
pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod library;
pub mod models;
pub mod playback;
pub mod resolver;
pub mod session;
pub mod traits;
pub mod transcode;
pub mod utils;

#[cfg(test)]
pub(crate) mod fakes;

pub use bootstrap::{EngineBootstrap, EngineState};
pub use errors::{ErrorKind, PreviewError};
pub use format_selector::{FormatSelector, QualityOption};
pub use library::PreviewLibrary;
pub use models::{
    AudioFormat, Control, Notice, NoticeLevel, PipelineProgress, PipelineStage, PreviewArtifact,
    VideoInfo,
};
pub use playback::{AudioPlayer, PlaybackCoordinator, PlaybackListener, PlayerState, SessionId};
pub use session::PreviewSession;
pub use traits::{MetadataEngine, NoopHooks, PresentationHooks, Relay, TranscodeEngine};
pub use utils::{format_bytes, format_time};
