use verdant_speech::{OutputError, SynthesisError};

/// Errors surfaced by the playback coordinator.
///
/// Supersession is not an error; see [`PlaybackOutcome`](crate::PlaybackOutcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Invalid playback request: {0}")]
    InvalidRequest(String),

    #[error("Audio generation failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Audio playback failed: {0}")]
    Output(#[from] OutputError),

    /// The background task driving the session did not complete
    #[error("Playback task aborted: {0}")]
    Aborted(String),
}

impl PlaybackError {
    /// Whether the failure needs configuration changes rather than a retry.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            PlaybackError::Synthesis(e) => e.is_configuration_error(),
            _ => false,
        }
    }
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
