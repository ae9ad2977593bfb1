//! HTTP synthesis backend.
//!
//! Posts `{ "key", "text", "voice" }` as JSON to a configured endpoint and
//! expects `{ "audioUri": "..." }` back. Authentication is a bearer token.

use crate::{SynthesisClient, SynthesisError, SynthesisRequest, SynthesisResponse, SynthesisResult};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for [`HttpSynthesisClient`]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpSynthesisConfig {
    /// Full URL of the synthesis endpoint
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Prebuilt voice to request when the caller does not pick one
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl HttpSynthesisConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            voice: None,
            timeout_secs: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

#[derive(Serialize)]
struct SynthesisBody<'a> {
    key: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

/// Synthesis client talking to a remote text-to-speech service
pub struct HttpSynthesisClient {
    config: HttpSynthesisConfig,
    client: reqwest::Client,
}

impl HttpSynthesisClient {
    pub fn new(config: HttpSynthesisConfig) -> SynthesisResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Other(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpSynthesisConfig {
        &self.config
    }

    fn api_key(&self) -> SynthesisResult<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(SynthesisError::NotConfigured(
                "no API key set for the synthesis backend".to_string(),
            )),
        }
    }
}

#[async_trait]
impl SynthesisClient for HttpSynthesisClient {
    async fn synthesize(&self, request: SynthesisRequest) -> SynthesisResult<SynthesisResponse> {
        let api_key = self.api_key()?;

        let voice = request
            .voice
            .as_ref()
            .map(|v| v.name())
            .or(self.config.voice.as_deref());
        let body = SynthesisBody {
            key: &request.key,
            text: &request.text,
            voice,
        };

        debug!(
            "Requesting synthesis for '{}' ({} chars) from {}",
            request.key,
            request.text.len(),
            self.config.endpoint
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SynthesisError::NotConfigured(format!(
                "backend rejected the API key ({status})"
            )));
        }
        if !status.is_success() {
            return Err(SynthesisError::ProviderError(format!("{status}: {text}")));
        }

        serde_json::from_str(&text).map_err(|e| SynthesisError::InvalidResponse(e.to_string()))
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
