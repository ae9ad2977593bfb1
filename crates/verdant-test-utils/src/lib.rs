//! Deterministic test doubles for Verdant playback.

mod output;
mod synthesis;

pub use output::{OutputCall, RecordingOutput};
pub use synthesis::{
    GatedSynthesisClient, StaticSynthesisClient, sample_audio_uri, sample_response,
};

use std::sync::Mutex;
use verdant_playback::{Notification, Notifier};

/// Notifier that keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.notifications().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}
