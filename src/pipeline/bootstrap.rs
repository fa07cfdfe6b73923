// Engine bootstrap - loads both engines and gates every pipeline operation

use std::sync::Arc;

use parking_lot::Mutex;

use super::errors::PreviewError;
use super::models::{EngineVersions, Notice};
use super::traits::{MetadataEngine, PresentationHooks, TranscodeEngine};

/// Readiness of the two engines
#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready(EngineVersions),
    Failed(String),
}

pub struct EngineBootstrap {
    metadata: Arc<dyn MetadataEngine>,
    transcoder: Arc<dyn TranscodeEngine>,
    state: Mutex<EngineState>,
}

impl EngineBootstrap {
    pub fn new(metadata: Arc<dyn MetadataEngine>, transcoder: Arc<dyn TranscodeEngine>) -> Self {
        Self {
            metadata,
            transcoder,
            state: Mutex::new(EngineState::Uninitialized),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), EngineState::Ready(_))
    }

    /// Fail fast unless both engines are loaded
    pub fn ensure_ready(&self) -> Result<(), PreviewError> {
        match &*self.state.lock() {
            EngineState::Ready(_) => Ok(()),
            EngineState::Uninitialized => {
                Err(PreviewError::Engine("Engines are not initialized".to_string()))
            }
            EngineState::Initializing => {
                Err(PreviewError::Engine("Engines are still loading".to_string()))
            }
            EngineState::Failed(reason) => Err(PreviewError::Engine(format!(
                "Engines failed to load: {}",
                reason
            ))),
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataEngine> {
        &self.metadata
    }

    pub fn transcoder(&self) -> &Arc<dyn TranscodeEngine> {
        &self.transcoder
    }

    /// Start the interpreter, install the resolution package, load the
    /// transcoder. Any failure is terminal for this attempt; calling again
    /// retries from the first step.
    pub async fn initialize(
        &self,
        hooks: &dyn PresentationHooks,
    ) -> Result<EngineVersions, PreviewError> {
        {
            let mut state = self.state.lock();
            match &*state {
                EngineState::Ready(versions) => return Ok(versions.clone()),
                EngineState::Initializing => {
                    return Err(PreviewError::Engine(
                        "Engines are already loading".to_string(),
                    ))
                }
                EngineState::Uninitialized | EngineState::Failed(_) => {
                    *state = EngineState::Initializing;
                }
            }
        }
        let mut attempt = AttemptGuard { state: &self.state, finished: false };

        hooks.notify(Notice::info("Loading engines..."));
        tracing::info!(
            "[Bootstrap] Loading engines: {} + {}",
            self.metadata.name(),
            self.transcoder.name()
        );

        match self.load_all().await {
            Ok(versions) => {
                tracing::info!(
                    "[Bootstrap] ✓ Ready ({} {}, {} {})",
                    self.metadata.name(),
                    versions.metadata,
                    self.transcoder.name(),
                    versions.transcoder
                );
                attempt.finish(EngineState::Ready(versions.clone()));
                hooks.notify(Notice::success("Engines ready"));
                Ok(versions)
            }
            Err(e) => {
                tracing::error!("[Bootstrap] ✗ Engine load failed: {}", e);
                attempt.finish(EngineState::Failed(e.to_string()));
                hooks.notify(Notice::error(format!("Failed to load engines: {}", e)));
                Err(e)
            }
        }
    }

    async fn load_all(&self) -> Result<EngineVersions, PreviewError> {
        self.metadata.start().await.map_err(into_engine_error)?;
        let metadata = self
            .metadata
            .install_package()
            .await
            .map_err(into_engine_error)?;
        let transcoder = self.transcoder.load().await.map_err(into_engine_error)?;
        Ok(EngineVersions { metadata, transcoder })
    }
}

/// Leaves `Initializing` behind if the initialize future is dropped mid-way
struct AttemptGuard<'a> {
    state: &'a Mutex<EngineState>,
    finished: bool,
}

impl AttemptGuard<'_> {
    fn finish(&mut self, outcome: EngineState) {
        *self.state.lock() = outcome;
        self.finished = true;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("[Bootstrap] Engine load cancelled");
            *self.state.lock() = EngineState::Failed("cancelled".to_string());
        }
    }
}

fn into_engine_error(e: PreviewError) -> PreviewError {
    match e {
        PreviewError::Engine(_) => e,
        other => PreviewError::Engine(other.to_string()),
    }
}
