use crate::error::OutputError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Voice identifier for synthesis (predefined voices only)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceIdentifier {
    /// Predefined voice name (e.g., "Algenib")
    pub name: String,
}

impl VoiceIdentifier {
    /// Create a voice identifier from a predefined voice name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Get the voice name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<String> for VoiceIdentifier {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for VoiceIdentifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Speech synthesis request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Caller-side identifier of the content being read out
    pub key: String,
    pub text: String,
    pub voice: Option<VoiceIdentifier>,
}

impl SynthesisRequest {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<VoiceIdentifier>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// Speech synthesis response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResponse {
    #[serde(rename = "audioUri")]
    pub audio: AudioUri,
}

/// Playable audio location produced by a synthesis backend.
///
/// The coordinator treats it as opaque; output devices interpret it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioUri(String);

impl AudioUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Build a `data:` URI from raw bytes.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        let payload = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode a `data:<mime>;base64,<payload>` URI.
    pub fn decode(&self) -> Result<DecodedAudio, OutputError> {
        let rest = self
            .0
            .strip_prefix("data:")
            .ok_or_else(|| OutputError::InvalidAudioUri("expected a data: URI".to_string()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| OutputError::InvalidAudioUri("missing ',' separator".to_string()))?;

        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            OutputError::InvalidAudioUri("only base64 data URIs are supported".to_string())
        })?;

        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload)
            .map_err(|e| OutputError::InvalidAudioUri(e.to_string()))?;

        if bytes.is_empty() {
            return Err(OutputError::InvalidAudioUri("empty payload".to_string()));
        }

        Ok(DecodedAudio {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }
}

// Data URIs can be megabytes long.
impl fmt::Debug for AudioUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(32).collect();
        write!(f, "AudioUri({head:?}, {} bytes)", self.0.len())
    }
}

impl From<String> for AudioUri {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

impl From<&str> for AudioUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Raw audio bytes extracted from a data URI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedAudio {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_decoding() {
        let uri = AudioUri::from_bytes("audio/wav", b"RIFF1234");
        let decoded = uri.decode().unwrap();
        assert_eq!(decoded.mime_type, "audio/wav");
        assert_eq!(decoded.bytes, b"RIFF1234");
    }

    #[test]
    fn test_rejects_non_data_uri() {
        let uri = AudioUri::new("https://example.com/a.wav");
        assert!(matches!(
            uri.decode(),
            Err(OutputError::InvalidAudioUri(_))
        ));
    }

    #[test]
    fn test_rejects_non_base64_and_empty_payloads() {
        assert!(AudioUri::new("data:audio/wav,plain").decode().is_err());
        assert!(AudioUri::new("data:audio/wav;base64,!!!").decode().is_err());
        assert!(AudioUri::new("data:audio/wav;base64,").decode().is_err());
    }

    #[test]
    fn test_response_uses_camel_case_field() {
        let response: SynthesisResponse =
            serde_json::from_str(r#"{"audioUri":"data:audio/wav;base64,AAAA"}"#).unwrap();
        assert_eq!(response.audio.as_str(), "data:audio/wav;base64,AAAA");
    }

    #[test]
    fn test_debug_truncates_payload() {
        let uri = AudioUri::from_bytes("audio/wav", &[0u8; 4096]);
        let rendered = format!("{uri:?}");
        assert!(rendered.len() < 100);
        assert!(rendered.contains("bytes"));
    }

    #[test]
    fn test_request_builder() {
        let request = SynthesisRequest::new("tulsi", "Holy basil").with_voice("Algenib");
        assert_eq!(request.key, "tulsi");
        assert_eq!(request.voice.as_ref().map(|v| v.name()), Some("Algenib"));
    }
}
