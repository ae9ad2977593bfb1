use crate::state::Generation;
use futures::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

pub type BoxEventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Why a session left the device before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// `stop` was called for the key
    Requested,
    /// A newer request took over the device
    Superseded,
}

/// Transitions published by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Loading {
        key: String,
        generation: Generation,
    },
    Started {
        key: String,
        generation: Generation,
    },
    Finished {
        key: String,
        generation: Generation,
    },
    Stopped {
        key: String,
        generation: Generation,
        reason: StopReason,
    },
    Failed {
        key: String,
        generation: Generation,
        message: String,
    },
}

impl PlaybackEvent {
    pub fn key(&self) -> &str {
        match self {
            PlaybackEvent::Loading { key, .. }
            | PlaybackEvent::Started { key, .. }
            | PlaybackEvent::Finished { key, .. }
            | PlaybackEvent::Stopped { key, .. }
            | PlaybackEvent::Failed { key, .. } => key,
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            PlaybackEvent::Loading { generation, .. }
            | PlaybackEvent::Started { generation, .. }
            | PlaybackEvent::Finished { generation, .. }
            | PlaybackEvent::Stopped { generation, .. }
            | PlaybackEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// Broadcast fan-out of playback events to any number of listeners.
pub(crate) struct EventFanout {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventFanout {
    pub(crate) fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    pub(crate) fn publish(&self, event: PlaybackEvent) {
        // No listeners is fine.
        let _ = self.tx.send(event);
    }

    /// Lagging listeners skip what they missed.
    pub(crate) fn subscribe(&self) -> BoxEventStream<PlaybackEvent> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(
            |item: Result<PlaybackEvent, BroadcastStreamRecvError>| async move { item.ok() },
        );
        Box::pin(stream)
    }
}
