use crate::error::PlaybackError;
use log::{error, warn};

/// Category of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The synthesis backend needs configuring before anything can play
    Configuration,
    /// Generation or playback failed; trying again may work
    Failure,
}

/// A message meant for the person who pressed play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub key: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub(crate) fn for_error(key: &str, err: &PlaybackError) -> Self {
        if err.is_configuration_error() {
            Self {
                key: key.to_string(),
                kind: NotificationKind::Configuration,
                title: "Audio unavailable".to_string(),
                message: format!("Speech synthesis needs to be configured: {err}"),
            }
        } else {
            Self {
                key: key.to_string(),
                kind: NotificationKind::Failure,
                title: "Audio failed".to_string(),
                message: "Could not generate or play audio. Please try again.".to_string(),
            }
        }
    }
}

/// Sink for user-visible notifications (toasts, status lines, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Configuration => error!(
                "[{}] {}: {}",
                notification.key, notification.title, notification.message
            ),
            NotificationKind::Failure => warn!(
                "[{}] {}: {}",
                notification.key, notification.title, notification.message
            ),
        }
    }
}
