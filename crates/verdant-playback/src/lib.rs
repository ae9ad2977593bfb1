//! # Verdant Playback
//!
//! Single-flight, single-device coordination of text-to-speech playback.
//!
//! Any number of independent UI units request playback under their own key.
//! The [`PlaybackCoordinator`] guarantees that:
//!
//! - at most one key is loading or playing at any time, process-wide;
//! - a new request tears down the previous session before it begins;
//! - a synthesis result that arrives after its session was superseded or
//!   stopped is discarded without touching shared state;
//! - every failure returns the key to idle and is reported exactly once.
//!
//! Per key, subscribers observe `Idle -> Loading -> Playing -> Idle`, or
//! `Idle -> Loading -> Idle` on error or supersession.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verdant_playback::PlaybackCoordinator;
//!
//! let coordinator = PlaybackCoordinator::new(synthesizer, output);
//! let mut card = coordinator.attach("tulsi");
//! card.play("Tulsi, or holy basil, is an aromatic perennial...");
//! card.wait_for(|s| s.is_playing()).await;
//! ```

mod config;
mod coordinator;
mod error;
mod events;
mod notification;
mod state;
mod subscriber;

pub use config::CoordinatorConfig;
pub use coordinator::{PlaybackCoordinator, PlaybackCoordinatorBuilder, PlaybackOutcome};
pub use error::{PlaybackError, PlaybackResult};
pub use events::{BoxEventStream, PlaybackEvent, StopReason};
pub use notification::{LogNotifier, Notification, NotificationKind, Notifier};
pub use state::{Generation, PlaybackSnapshot, PlaybackStatus};
pub use subscriber::{PlaybackSubscriber, Subscription};
