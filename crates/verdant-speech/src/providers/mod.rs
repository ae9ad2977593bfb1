//! Synthesis provider implementations
//!
//! Each provider is feature-gated and can be enabled individually.

#[cfg(feature = "http")]
pub mod http;
