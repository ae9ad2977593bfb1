//! # Verdant Speech
//!
//! Speech synthesis and audio output abstractions for Verdant.
//!
//! ## Architecture
//!
//! - `SynthesisClient`: turns a keyed piece of text into a playable `AudioUri`
//! - `AudioOutput`: the single shared output device (load, play, pause, rewind)
//!
//! ## Providers
//!
//! Enable providers using feature flags:
//! - `http`: remote text-to-speech service over HTTP (default)
//! - `playback`: rodio-backed `AudioOutput` on the default device
//!
//! ## Example
//!
//! ```rust
//! use verdant_speech::{SynthesisClient, SynthesisRequest};
//!
//! async fn describe(client: &dyn SynthesisClient, key: &str, text: &str) {
//!     let request = SynthesisRequest::new(key, text).with_voice("Algenib");
//!     match client.synthesize(request).await {
//!         Ok(response) => println!("Audio ready: {:?}", response.audio),
//!         Err(e) => eprintln!("Synthesis failed: {e}"),
//!     }
//! }
//! ```

pub mod error;
mod provider;
pub mod types;

// Provider implementations
pub mod providers;

pub use error::{OutputError, OutputResult, SynthesisError, SynthesisResult};
pub use provider::{AudioOutput, OutputEvent, SynthesisClient};
pub use types::{AudioUri, DecodedAudio, SynthesisRequest, SynthesisResponse, VoiceIdentifier};

#[cfg(feature = "http")]
pub use providers::http::{HttpSynthesisClient, HttpSynthesisConfig};

#[cfg(feature = "playback")]
pub mod playback;
