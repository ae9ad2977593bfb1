use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use verdant::playback::CoordinatorConfig;
use verdant::speech::HttpSynthesisConfig;

fn default_api_key_env() -> String {
    "VERDANT_TTS_API_KEY".to_string()
}

fn default_poll_interval_ms() -> u64 {
    50
}

/// `[synthesis]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSection {
    #[serde(flatten)]
    pub http: HttpSynthesisConfig,
    /// Environment variable consulted when `api_key` is not set in the file
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// `[output]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl OutputSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub synthesis: SynthesisSection,
    #[serde(default)]
    pub playback: CoordinatorConfig,
    #[serde(default)]
    pub output: OutputSection,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.synthesis.http.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!("synthesis.endpoint must be an http(s) URL, got '{endpoint}'");
        }
        if self.output.poll_interval_ms == 0 {
            bail!("output.poll_interval_ms must be greater than zero");
        }
        self.playback
            .validate()
            .map_err(|e| anyhow::anyhow!("playback: {e}"))?;
        Ok(())
    }

    /// Synthesis settings with the API key resolved from the file or the environment.
    pub fn resolved_synthesis(&self) -> HttpSynthesisConfig {
        let mut http = self.synthesis.http.clone();
        if http.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            http.api_key = std::env::var(&self.synthesis.api_key_env).ok();
        }
        http
    }
}
