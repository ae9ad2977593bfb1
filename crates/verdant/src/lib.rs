// Re-export for convenience
pub use async_trait::async_trait;
pub use verdant_playback::{self as playback, PlaybackError};
pub use verdant_speech::{self as speech, OutputError, SynthesisError};
pub mod prelude;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
/// This is a no-op if the feature is not enabled.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
