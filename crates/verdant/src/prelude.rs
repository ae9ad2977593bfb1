//! Verdant prelude: the types a UI layer needs to wire up playback.

// Coordination
pub use crate::playback::{
    CoordinatorConfig, LogNotifier, Notification, NotificationKind, Notifier,
    PlaybackCoordinator, PlaybackEvent, PlaybackOutcome, PlaybackStatus, PlaybackSubscriber,
    StopReason, Subscription,
};

// Speech
pub use crate::speech::{
    AudioOutput, AudioUri, OutputEvent, SynthesisClient, SynthesisRequest, SynthesisResponse,
};
#[cfg(feature = "http")]
pub use crate::speech::{HttpSynthesisClient, HttpSynthesisConfig};
#[cfg(feature = "playback")]
pub use crate::speech::playback::{RodioOutput, RodioOutputConfig};

// Errors
pub use crate::{OutputError, PlaybackError, SynthesisError};

// Utils
pub use crate::init_logging;
