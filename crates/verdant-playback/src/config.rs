use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`PlaybackCoordinator`](crate::PlaybackCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Capacity of the playback event broadcast channel
    pub event_buffer: usize,
    /// Upper bound on a single synthesis call; `None` waits indefinitely
    pub synthesis_timeout_secs: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            event_buffer: 64,
            synthesis_timeout_secs: Some(60),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_synthesis_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.synthesis_timeout_secs = timeout_secs;
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    pub(crate) fn synthesis_timeout(&self) -> Option<Duration> {
        self.synthesis_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.event_buffer == 0 {
            return Err("event_buffer must be greater than zero".to_string());
        }
        if self.synthesis_timeout_secs == Some(0) {
            return Err("synthesis_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}
