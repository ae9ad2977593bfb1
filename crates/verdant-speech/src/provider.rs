use crate::{AudioUri, OutputResult, SynthesisRequest, SynthesisResponse, SynthesisResult};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Trait for speech synthesis backends
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Generate playable audio for a piece of text
    ///
    /// # Arguments
    /// * `request` - Synthesis request with key, text and optional voice
    ///
    /// # Returns
    /// Response carrying the audio URI
    async fn synthesize(&self, request: SynthesisRequest) -> SynthesisResult<SynthesisResponse>;

    /// Get the provider name
    fn provider_name(&self) -> &str {
        "unknown"
    }
}

/// Notifications raised by an audio output device
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    Started,
    Ended,
    Error(String),
}

/// The single shared audio output device.
///
/// Implementations report asynchronous progress through [`OutputEvent`]s;
/// receivers only observe events sent after they subscribed.
pub trait AudioOutput: Send + Sync {
    /// Replace the loaded audio. Does not start playback.
    fn load(&self, audio: &AudioUri) -> OutputResult<()>;

    /// Start or resume playback of the loaded audio
    fn play(&self) -> OutputResult<()>;

    fn pause(&self);

    /// Rewind so the next `play` starts from the beginning
    fn reset_position(&self);

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;
}
