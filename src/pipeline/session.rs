// PreviewSession - the application state object
//
// Owns the engines (through the bootstrap), the current VideoInfo and
// selection, the library and the playback coordinator. Every public action
// reports its own failures to the hooks and re-enables its control before
// handing the error back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::bootstrap::{EngineBootstrap, EngineState};
use super::errors::PreviewError;
use super::format_selector::{FormatSelector, QualityOption};
use super::models::{ArtifactId, Control, EngineVersions, Notice, PreviewArtifact, VideoInfo};
use super::playback::{AudioPlayer, PlaybackCoordinator, PlaybackListener};
use super::resolver::MetadataResolver;
use super::transcode::{PreviewRequest, TracingLogListener, TranscodePipeline};
use super::library::PreviewLibrary;
use super::traits::{MetadataEngine, PresentationHooks, Relay, TranscodeEngine};

pub struct PreviewSession {
    bootstrap: EngineBootstrap,
    resolver: MetadataResolver,
    pipeline: TranscodePipeline,
    selector: Mutex<FormatSelector>,
    library: PreviewLibrary,
    coordinator: Arc<PlaybackCoordinator>,
    /// One player per library entry, dropped when the entry is deleted
    players: Mutex<HashMap<ArtifactId, Arc<AudioPlayer>>>,
    hooks: Arc<dyn PresentationHooks>,
    /// Held for the whole of a preview run; the transcoder namespace is shared
    run_guard: tokio::sync::Mutex<()>,
}

impl PreviewSession {
    pub fn new(
        metadata: Arc<dyn MetadataEngine>,
        transcoder: Arc<dyn TranscodeEngine>,
        relay: Arc<dyn Relay>,
        hooks: Arc<dyn PresentationHooks>,
    ) -> Self {
        transcoder.subscribe_logs(Arc::new(TracingLogListener));

        Self {
            resolver: MetadataResolver::new(metadata.clone()),
            pipeline: TranscodePipeline::new(relay, transcoder.clone()),
            bootstrap: EngineBootstrap::new(metadata, transcoder),
            selector: Mutex::new(FormatSelector::new()),
            library: PreviewLibrary::new(),
            coordinator: Arc::new(PlaybackCoordinator::new()),
            players: Mutex::new(HashMap::new()),
            hooks,
            run_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Load both engines; safe to call again after a failure
    pub async fn initialize(&self) -> Result<EngineVersions, PreviewError> {
        self.bootstrap.initialize(self.hooks.as_ref()).await
    }

    pub fn engine_state(&self) -> EngineState {
        self.bootstrap.state()
    }

    /// Resolve `url` and make the result the current VideoInfo
    pub async fn extract(&self, url: &str) -> Result<Arc<VideoInfo>, PreviewError> {
        self.hooks.control_busy(Control::Extract, true);
        let result = self.extract_inner(url).await;
        if let Err(e) = &result {
            self.report("Extract", e);
        }
        self.hooks.control_busy(Control::Extract, false);
        result
    }

    async fn extract_inner(&self, url: &str) -> Result<Arc<VideoInfo>, PreviewError> {
        self.bootstrap.ensure_ready()?;
        let info = Arc::new(self.resolver.resolve(url).await?);

        self.selector.lock().load(info.clone());
        self.hooks.details_changed(Some(&info));
        if info.audio_formats.is_empty() {
            self.hooks
                .notify(Notice::warning("No audio-only formats found for this media"));
        }
        Ok(info)
    }

    /// Choose one of the current formats; unknown ids are rejected
    pub fn select(&self, format_id: &str) -> bool {
        self.selector.lock().select(format_id)
    }

    pub fn current_info(&self) -> Option<Arc<VideoInfo>> {
        self.selector.lock().current().cloned()
    }

    pub fn selected_format_id(&self) -> Option<String> {
        self.selector.lock().selected_id().map(str::to_string)
    }

    pub fn quality_options(&self) -> Vec<QualityOption> {
        self.selector.lock().quality_options()
    }

    /// Run the transcode pipeline for the current selection and store the
    /// result in the library. Only one run may be in flight.
    pub async fn preview(&self) -> Result<PreviewArtifact, PreviewError> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            let e = PreviewError::Busy;
            self.report("Preview", &e);
            return Err(e);
        };

        self.hooks.control_busy(Control::Preview, true);
        let result = self.preview_inner().await;
        match &result {
            Ok(artifact) => {
                self.library.append(artifact.clone());
                self.hooks.library_changed(&self.library.all());
                self.hooks.url_cleared();
                self.hooks.details_changed(None);
                self.hooks
                    .notify(Notice::success(format!("Added '{}' to previews", artifact.title)));
            }
            Err(e) => self.report("Preview", e),
        }
        self.hooks.progress(None);
        self.hooks.control_busy(Control::Preview, false);
        result
    }

    async fn preview_inner(&self) -> Result<PreviewArtifact, PreviewError> {
        self.bootstrap.ensure_ready()?;
        // Snapshot now; a resolution during the run must not leak into it
        let request = PreviewRequest::from_selection(&self.selector.lock())?;
        self.pipeline.run(&request, self.hooks.as_ref()).await
    }

    pub fn library(&self) -> &PreviewLibrary {
        &self.library
    }

    pub fn coordinator(&self) -> &Arc<PlaybackCoordinator> {
        &self.coordinator
    }

    /// Save the entry at `index` as `<title>.mp3` in `dir`
    pub fn download(&self, index: usize, dir: &Path) -> Result<PathBuf, PreviewError> {
        match self.library.export(index, dir) {
            Ok(path) => {
                self.hooks
                    .notify(Notice::success(format!("Saved {}", path.display())));
                Ok(path)
            }
            Err(e) => {
                self.report("Download", &e);
                Err(e)
            }
        }
    }

    /// Remove the entry at `index` once `confirm` agrees. Returns whether
    /// anything was removed.
    pub fn delete<F>(&self, index: usize, confirm: F) -> bool
    where
        F: FnOnce(&PreviewArtifact) -> bool,
    {
        let Some(artifact) = self.library.get(index) else {
            self.hooks
                .notify(Notice::warning(format!("No preview at position {}", index + 1)));
            return false;
        };

        if !confirm(&artifact) {
            return false;
        }

        // Stop playback before the handle goes away
        let player = self.players.lock().remove(&artifact.id);
        if let Some(player) = player {
            player.release();
        }

        let removed = self.library.remove_at(index);
        if removed {
            self.hooks.library_changed(&self.library.all());
            self.hooks
                .notify(Notice::info(format!("Deleted '{}'", artifact.title)));
        }
        removed
    }

    /// The player for entry `index`, created on first use from the
    /// library's playable handle. `listener` only applies to a new player.
    pub fn player(
        &self,
        index: usize,
        listener: Option<Arc<dyn PlaybackListener>>,
    ) -> Option<Arc<AudioPlayer>> {
        let artifact = self.library.get(index)?;
        let mut players = self.players.lock();
        if let Some(player) = players.get(&artifact.id) {
            return Some(player.clone());
        }

        let source = self.library.playable_url(index)?;
        let player = AudioPlayer::new(&artifact, source, self.coordinator.clone(), listener);
        players.insert(artifact.id, player.clone());
        Some(player)
    }

    /// Players of entries still in the library, in library order
    pub fn players(&self) -> Vec<Arc<AudioPlayer>> {
        let players = self.players.lock();
        self.library
            .all()
            .iter()
            .filter_map(|a| players.get(&a.id).cloned())
            .collect()
    }

    fn report(&self, action: &str, e: &PreviewError) {
        tracing::error!("[Session] {} failed: {:?}", action, e);
        if let PreviewError::Transcode { log, .. } = e {
            for line in log {
                tracing::error!("[Session]   {}", line);
            }
        }
        self.hooks.notify(Notice::error(e.user_message()));
    }
}
