use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Lock ignoring poisoning; every critical section leaves the state consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Monotonic tag distinguishing a playback session from the ones it superseded.
pub type Generation = u64;

/// Monotonic counter bumped on every change to the global state.
pub type Revision = u64;

/// Per-key playback state as observed by subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
}

impl PlaybackStatus {
    pub fn is_loading(self) -> bool {
        self == PlaybackStatus::Loading
    }

    pub fn is_playing(self) -> bool {
        self == PlaybackStatus::Playing
    }

    pub fn is_active(self) -> bool {
        self != PlaybackStatus::Idle
    }
}

/// The session currently holding the output device.
pub(crate) struct ActiveSession {
    pub(crate) key: String,
    pub(crate) generation: Generation,
    pub(crate) status: PlaybackStatus,
    /// Task relaying device events for this session, once playing
    pub(crate) watcher: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Stop relaying device events for this session.
    pub(crate) fn detach(mut self) -> (String, Generation) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        (self.key, self.generation)
    }
}

/// Process-wide playback state. Only the coordinator mutates it.
#[derive(Default)]
pub(crate) struct GlobalPlaybackState {
    pub(crate) active: Option<ActiveSession>,
    pub(crate) generation: Generation,
    pub(crate) revision: Revision,
}

impl GlobalPlaybackState {
    pub(crate) fn next_generation(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    /// Record a mutation. Every change to `active` or its status goes through here.
    pub(crate) fn touch(&mut self) -> Revision {
        self.revision += 1;
        self.revision
    }

    /// Install `session` as the active one.
    pub(crate) fn activate(&mut self, session: ActiveSession) {
        self.active = Some(session);
        self.touch();
    }

    /// Remove whatever session is active.
    pub(crate) fn take_active(&mut self) -> Option<ActiveSession> {
        let session = self.active.take();
        if session.is_some() {
            self.touch();
        }
        session
    }

    pub(crate) fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.key.as_str())
    }

    /// Status derived by comparing `key` against the active session.
    pub(crate) fn status_of(&self, key: &str) -> PlaybackStatus {
        match &self.active {
            Some(session) if session.key == key => session.status,
            _ => PlaybackStatus::Idle,
        }
    }

    pub(crate) fn is_current(&self, generation: Generation) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    pub(crate) fn current_mut(&mut self, generation: Generation) -> Option<&mut ActiveSession> {
        self.active
            .as_mut()
            .filter(|s| s.generation == generation)
    }

    /// Remove the active session when it belongs to `key`.
    pub(crate) fn take_if_key(&mut self, key: &str) -> Option<ActiveSession> {
        if self.active_key() == Some(key) {
            self.take_active()
        } else {
            None
        }
    }

    /// Remove the active session when it is still `generation`.
    pub(crate) fn take_if_current(&mut self, generation: Generation) -> Option<ActiveSession> {
        if self.is_current(generation) {
            self.take_active()
        } else {
            None
        }
    }

    pub(crate) fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            active_key: self.active_key().map(str::to_string),
            status: self
                .active
                .as_ref()
                .map(|s| s.status)
                .unwrap_or_default(),
            generation: self.generation,
            revision: self.revision,
        }
    }
}

/// Read-only copy of the global playback state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub active_key: Option<String>,
    /// Status of `active_key`; `Idle` when nothing is active
    pub status: PlaybackStatus,
    /// Latest generation handed out
    pub generation: Generation,
    /// Revision of the state this snapshot was taken from
    pub revision: Revision,
}

impl PlaybackSnapshot {
    pub fn status_of(&self, key: &str) -> PlaybackStatus {
        if self.active_key.as_deref() == Some(key) {
            self.status
        } else {
            PlaybackStatus::Idle
        }
    }
}
