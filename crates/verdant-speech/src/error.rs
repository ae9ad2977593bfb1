use thiserror::Error;

/// Synthesis-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The backend cannot be used until it is configured (e.g. missing API key)
    #[error("Speech synthesis is not configured: {0}")]
    NotConfigured(String),

    /// Provider-specific error
    #[error("Synthesis provider error: {0}")]
    ProviderError(String),

    /// Network or connection failure
    #[error("Synthesis transport error: {0}")]
    Transport(String),

    /// The backend answered but the payload could not be used
    #[error("Invalid synthesis response: {0}")]
    InvalidResponse(String),

    /// The backend did not answer in time (seconds)
    #[error("Synthesis timed out after {0}s")]
    Timeout(u64),

    /// Other errors
    #[error("Synthesis error: {0}")]
    Other(String),
}

impl SynthesisError {
    /// Whether this failure needs operator action rather than a retry.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, SynthesisError::NotConfigured(_))
    }
}

/// Result type for synthesis operations
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Audio output device errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("Failed to initialize audio output stream: {0}")]
    InitFailed(String),

    #[error("Audio output device is no longer available")]
    DeviceUnavailable,

    #[error("Invalid audio URI: {0}")]
    InvalidAudioUri(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("No audio loaded")]
    NothingLoaded,

    /// The device reported a failure while playing
    #[error("Playback error: {0}")]
    Playback(String),
}

/// Result type for output device operations
pub type OutputResult<T> = Result<T, OutputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_classification() {
        assert!(SynthesisError::NotConfigured("missing key".into()).is_configuration_error());
        assert!(!SynthesisError::Timeout(30).is_configuration_error());
        assert!(!SynthesisError::ProviderError("503".into()).is_configuration_error());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SynthesisError::Timeout(12).to_string(),
            "Synthesis timed out after 12s"
        );
        assert_eq!(OutputError::NothingLoaded.to_string(), "No audio loaded");
    }
}
