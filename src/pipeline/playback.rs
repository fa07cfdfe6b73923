// Playback coordinator - at most one session plays at a time
//
// The coordinator only knows sessions that register through `request_play`;
// it cannot stop audio it has never been told about.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::models::{ArtifactId, PreviewArtifact};
use super::utils::format_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What the coordinator can ask of a registered session
pub trait PlaybackControl: Send + Sync {
    fn session_id(&self) -> SessionId;

    /// Pause because another session started. Must not call back into the
    /// coordinator.
    fn preempt(&self);
}

#[derive(Default)]
pub struct PlaybackCoordinator {
    current: Mutex<Option<Arc<dyn PlaybackControl>>>,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` the playing one, pausing whichever session held the
    /// pointer before. Returns once the previous session has been paused.
    pub fn request_play(&self, session: Arc<dyn PlaybackControl>) {
        let id = session.session_id();
        let previous = self.current.lock().replace(session);

        if let Some(prev) = previous {
            if prev.session_id() != id {
                tracing::debug!("[Playback] {} pre-empts {}", id, prev.session_id());
                prev.preempt();
            }
        }
    }

    /// Clear the pointer if `id` holds it
    pub fn request_pause(&self, id: SessionId) {
        let mut current = self.current.lock();
        if current.as_ref().map_or(false, |s| s.session_id() == id) {
            *current = None;
        }
    }

    /// Natural end of playback; same effect as a pause
    pub fn on_ended(&self, id: SessionId) {
        self.request_pause(id);
    }

    pub fn current(&self) -> Option<SessionId> {
        self.current.lock().as_ref().map(|s| s.session_id())
    }

    pub fn is_playing(&self, id: SessionId) -> bool {
        self.current() == Some(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Paused,
    Playing,
    Ended,
}

/// State-change notifications from players
pub trait PlaybackListener: Send + Sync {
    fn on_state_change(&self, id: SessionId, state: PlayerState);

    fn on_time_update(&self, _id: SessionId, _position: Duration, _duration: Duration) {}
}

struct PlayerInner {
    state: PlayerState,
    position: Duration,
    /// Set once the clip has left the library
    released: bool,
}

/// Minimal per-clip player: play/pause, elapsed/duration and seek
pub struct AudioPlayer {
    id: SessionId,
    artifact_id: ArtifactId,
    source: String,
    duration: Duration,
    coordinator: Arc<PlaybackCoordinator>,
    listener: Option<Arc<dyn PlaybackListener>>,
    inner: Mutex<PlayerInner>,
}

impl AudioPlayer {
    /// `source` is the library's playable handle for `artifact`
    pub fn new(
        artifact: &PreviewArtifact,
        source: String,
        coordinator: Arc<PlaybackCoordinator>,
        listener: Option<Arc<dyn PlaybackListener>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::next(),
            artifact_id: artifact.id,
            source,
            duration: artifact.estimated_duration(),
            coordinator,
            listener,
            inner: Mutex::new(PlayerInner {
                state: PlayerState::Paused,
                position: Duration::ZERO,
                released: false,
            }),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn artifact_id(&self) -> ArtifactId {
        self.artifact_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn position(&self) -> Duration {
        self.inner.lock().position
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn play(self: &Arc<Self>) {
        // Playing must be visible before the pointer swap, so a later
        // request_play that displaces this player always finds it Playing
        {
            let mut inner = self.inner.lock();
            if inner.released || inner.state == PlayerState::Playing {
                return;
            }
            if inner.state == PlayerState::Ended {
                inner.position = Duration::ZERO;
            }
            inner.state = PlayerState::Playing;
        }
        self.coordinator.request_play(self.clone());
        if self.state() == PlayerState::Playing {
            self.emit_state(PlayerState::Playing);
        }
    }

    pub fn pause(&self) {
        if !self.transition(PlayerState::Playing, PlayerState::Paused) {
            return;
        }
        self.coordinator.request_pause(self.id);
        self.emit_state(PlayerState::Paused);
    }

    pub fn toggle(self: &Arc<Self>) {
        match self.state() {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused | PlayerState::Ended => self.play(),
        }
    }

    /// The clip is gone: stop, give up the coordinator pointer and refuse
    /// to play again
    pub fn release(&self) {
        let was_playing = {
            let mut inner = self.inner.lock();
            inner.released = true;
            let was_playing = inner.state == PlayerState::Playing;
            if was_playing {
                inner.state = PlayerState::Paused;
            }
            was_playing
        };
        self.coordinator.request_pause(self.id);
        if was_playing {
            self.emit_state(PlayerState::Paused);
        }
    }

    /// Jump to `position`, clamped to the clip length
    pub fn seek(&self, position: Duration) {
        let position = position.min(self.duration);
        let rewound = {
            let mut inner = self.inner.lock();
            inner.position = position;
            let rewound = inner.state == PlayerState::Ended && position < self.duration;
            if rewound {
                inner.state = PlayerState::Paused;
            }
            rewound
        };
        self.emit_time(position);
        if rewound {
            self.emit_state(PlayerState::Paused);
        }
    }

    /// Let `elapsed` of playing time pass; reaching the end clears the
    /// coordinator pointer
    pub fn advance(&self, elapsed: Duration) {
        let (position, ended) = {
            let mut inner = self.inner.lock();
            if inner.state != PlayerState::Playing {
                return;
            }
            inner.position = (inner.position + elapsed).min(self.duration);
            let ended = inner.position >= self.duration;
            if ended {
                inner.state = PlayerState::Ended;
            }
            (inner.position, ended)
        };

        self.emit_time(position);
        if ended {
            self.coordinator.on_ended(self.id);
            self.emit_state(PlayerState::Ended);
        }
    }

    /// "elapsed / duration" in M:SS
    pub fn time_label(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.position().as_secs_f64()),
            format_time(self.duration.as_secs_f64())
        )
    }

    fn transition(&self, from: PlayerState, to: PlayerState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != from {
            return false;
        }
        inner.state = to;
        true
    }

    fn emit_state(&self, state: PlayerState) {
        if let Some(listener) = &self.listener {
            listener.on_state_change(self.id, state);
        }
    }

    fn emit_time(&self, position: Duration) {
        if let Some(listener) = &self.listener {
            listener.on_time_update(self.id, position, self.duration);
        }
    }
}

impl PlaybackControl for AudioPlayer {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn preempt(&self) {
        if self.transition(PlayerState::Playing, PlayerState::Paused) {
            self.emit_state(PlayerState::Paused);
        }
    }
}
