//! Engine configuration, loadable from TOML with environment overrides.

use crate::error::{NarrationError, NarrationResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default voice profile ("Rachel")
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Default text-to-speech relay endpoint (local backend functions)
pub const DEFAULT_TTS_URL: &str = "http://localhost:54321/functions/v1/text-to-speech";

/// Environment variable overriding [`NarrationConfig::tts_url`]
pub const ENV_TTS_URL: &str = "NARRATION_TTS_URL";

/// Environment variable overriding [`NarrationConfig::api_key`]
pub const ENV_API_KEY: &str = "NARRATION_API_KEY";

/// File holding persisted voice state inside the state directory
pub const STATE_FILE_NAME: &str = "voice_state.json";

/// Narration engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Text-to-speech endpoint receiving `{ text, voiceId }`
    pub tts_url: String,
    /// Bearer key sent to the endpoint, if any
    pub api_key: Option<String>,
    /// Voice used when a request names none
    pub default_voice_id: String,
    /// Upper bound on a single synthesis call, in milliseconds
    pub synthesis_timeout_ms: u64,
    /// Pause between pause-delimited segments, in milliseconds
    pub segment_pause_ms: u64,
    /// Longest text accepted by a synthesis call
    pub max_text_length: usize,
    /// Directory for persisted voice state; platform default when absent
    pub state_dir: Option<PathBuf>,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            tts_url: DEFAULT_TTS_URL.to_string(),
            api_key: None,
            default_voice_id: DEFAULT_VOICE_ID.to_string(),
            synthesis_timeout_ms: 30_000,
            segment_pause_ms: 1_000,
            max_text_length: crate::MAX_TEXT_LENGTH,
            state_dir: None,
        }
    }
}

impl NarrationConfig {
    /// Parse a configuration from TOML; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the values are invalid
    pub fn from_toml_str(content: &str) -> NarrationResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> NarrationResult<Self> {
        info!("Loading narration config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `NARRATION_TTS_URL` / `NARRATION_API_KEY` when set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_TTS_URL) {
            debug!("Overriding TTS endpoint from {}", ENV_TTS_URL);
            self.tts_url = url;
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        self
    }

    /// Synthesis timeout as a duration
    #[must_use]
    pub const fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    /// Segment pause as a duration
    #[must_use]
    pub const fn segment_pause(&self) -> Duration {
        Duration::from_millis(self.segment_pause_ms)
    }

    /// Directory for persisted voice state
    ///
    /// # Errors
    ///
    /// Returns an error if no state directory is configured and the platform
    /// has no home directory
    pub fn resolved_state_dir(&self) -> NarrationResult<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        let dirs = ProjectDirs::from("ai", "Narration", "narration").ok_or_else(|| {
            NarrationError::configuration("Failed to determine project directories")
        })?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Path of the persisted voice state file
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be resolved
    pub fn state_file(&self) -> NarrationResult<PathBuf> {
        Ok(self.resolved_state_dir()?.join(STATE_FILE_NAME))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> NarrationResult<()> {
        if self.tts_url.trim().is_empty() {
            return Err(NarrationError::configuration("tts_url cannot be empty"));
        }
        if !(self.tts_url.starts_with("http://") || self.tts_url.starts_with("https://")) {
            return Err(NarrationError::configuration(format!(
                "tts_url must be an http(s) URL, got '{}'",
                self.tts_url
            )));
        }
        if self.default_voice_id.trim().is_empty() {
            return Err(NarrationError::configuration(
                "default_voice_id cannot be empty",
            ));
        }
        if self.synthesis_timeout_ms == 0 {
            return Err(NarrationError::configuration(
                "synthesis_timeout_ms must be greater than 0",
            ));
        }
        if self.max_text_length == 0 {
            return Err(NarrationError::configuration(
                "max_text_length must be greater than 0",
            ));
        }
        Ok(())
    }
}
