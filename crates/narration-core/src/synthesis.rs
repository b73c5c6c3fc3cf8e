//! Text-to-speech synthesis clients.
//!
//! [`RelaySynthesizer`] talks to a backend function that accepts
//! `{ "text", "voiceId" }` and answers `{ "audioContent": <base64> }` or
//! `{ "error": "..." }`. [`ElevenLabsSynthesizer`] calls the voice provider
//! directly and is what the relay uses behind the scenes.

use crate::config::NarrationConfig;
use crate::error::{NarrationError, NarrationResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, error, info};

/// Marker the relay puts in front of quota errors
pub const QUOTA_MARKER: &str = "QUOTA_EXCEEDED";

/// Marker the voice provider puts in its quota error bodies
pub const PROVIDER_QUOTA_MARKER: &str = "quota_exceeded";

/// Message used when the provider runs out of credits
pub const QUOTA_MESSAGE: &str =
    "ElevenLabs credits depleted. Please add more credits at elevenlabs.io";

/// Default ElevenLabs API base URL
pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io";

/// Default ElevenLabs model
pub const ELEVENLABS_MODEL_ID: &str = "eleven_turbo_v2_5";

const XI_API_KEY_HEADER: &str = "xi-api-key";
const AUDIO_MPEG: &str = "audio/mpeg";

/// One synthesis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Voice profile
    pub voice_id: String,
}

impl SynthesisRequest {
    /// Create a synthesis request
    #[must_use]
    pub fn new<T: Into<String>, V: Into<String>>(text: T, voice_id: V) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
        }
    }

    /// Validate the request against a maximum text length
    ///
    /// # Errors
    ///
    /// Returns an error if the text is blank or too long, or the voice is empty
    pub fn validate(&self, max_text_length: usize) -> NarrationResult<()> {
        if self.text.trim().is_empty() {
            return Err(NarrationError::invalid_input("Text is required"));
        }
        if self.text.chars().count() > max_text_length {
            return Err(NarrationError::invalid_input(format!(
                "Text length {} exceeds maximum of {}",
                self.text.chars().count(),
                max_text_length
            )));
        }
        if self.voice_id.trim().is_empty() {
            return Err(NarrationError::invalid_input("Voice ID cannot be empty"));
        }
        Ok(())
    }
}

/// Encoded audio returned by a synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// Encoded audio bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub mime_type: String,
}

impl SynthesizedAudio {
    /// Wrap MP3 bytes
    #[must_use]
    pub fn mpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: AUDIO_MPEG.to_string(),
        }
    }

    /// Decode a base64 MP3 payload
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64
    pub fn from_base64(encoded: &str) -> NarrationResult<Self> {
        Ok(Self::mpeg(BASE64.decode(encoded.trim())?))
    }

    /// Encode the audio as base64
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Size of the encoded audio in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A text-to-speech backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Synthesize one utterance
    ///
    /// # Errors
    ///
    /// Returns [`NarrationError::QuotaExhausted`] when the provider is out of
    /// credits, and another variant for every other failure
    async fn synthesize(&self, request: &SynthesisRequest) -> NarrationResult<SynthesizedAudio>;
}

/// Map a relay or provider error message to an error, spotting quota exhaustion
#[must_use]
pub fn classify_provider_error(message: &str) -> NarrationError {
    if let Some(rest) = message.trim().strip_prefix(QUOTA_MARKER) {
        let detail = rest.trim_start_matches(':').trim();
        return NarrationError::quota_exhausted(if detail.is_empty() {
            QUOTA_MESSAGE
        } else {
            detail
        });
    }
    if message.contains(QUOTA_MARKER) || message.contains(PROVIDER_QUOTA_MARKER) {
        return NarrationError::quota_exhausted(QUOTA_MESSAGE);
    }
    NarrationError::synthesis(message)
}

fn build_client(timeout: Duration) -> NarrationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NarrationError::configuration(format!("Failed to create HTTP client: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayReply {
    #[serde(default)]
    audio_content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client of the text-to-speech relay function
#[derive(Clone)]
pub struct RelaySynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RelaySynthesizer {
    /// Create a client for `endpoint` with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new<S: Into<String>>(endpoint: S, timeout: Duration) -> NarrationResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    /// Create a client from engine configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &NarrationConfig) -> NarrationResult<Self> {
        let mut synthesizer = Self::new(config.tts_url.clone(), config.synthesis_timeout())?;
        synthesizer.api_key = config.api_key.clone();
        Ok(synthesizer)
    }

    /// Send `key` as a bearer token and `apikey` header
    #[must_use]
    pub fn with_api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Endpoint this client posts to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for RelaySynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySynthesizer")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SpeechSynthesizer for RelaySynthesizer {
    fn name(&self) -> &str {
        "relay"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> NarrationResult<SynthesizedAudio> {
        debug!(
            voice = %request.voice_id,
            chars = request.text.len(),
            "Requesting speech from relay"
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder
                .header(AUTHORIZATION, format!("Bearer {key}"))
                .header("apikey", key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let reply = serde_json::from_str::<RelayReply>(&body);
        if !status.is_success() {
            let message = match reply {
                Ok(RelayReply {
                    error: Some(message),
                    ..
                }) => message,
                _ => format!("Relay returned {status}: {body}"),
            };
            error!(%status, "Relay synthesis failed: {}", message);
            return Err(classify_provider_error(&message));
        }

        let reply = reply?;
        if let Some(message) = reply.error {
            return Err(classify_provider_error(&message));
        }
        let encoded = reply
            .audio_content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| NarrationError::synthesis("No audio content received"))?;

        let audio = SynthesizedAudio::from_base64(&encoded)?;
        info!("Relay synthesized {} bytes of audio", audio.len());
        Ok(audio)
    }
}

/// Voice rendering settings sent to ElevenLabs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0)
    pub stability: f32,
    /// Similarity to the reference voice (0.0 to 1.0)
    pub similarity_boost: f32,
    /// Style exaggeration (0.0 to 1.0)
    pub style: f32,
    /// Speaker boost toggle
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.7,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

#[derive(Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

/// Direct client of the ElevenLabs text-to-speech API
#[derive(Clone)]
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSynthesizer {
    /// Create a client with the given API key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built
    pub fn new<S: Into<String>>(api_key: S, timeout: Duration) -> NarrationResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(NarrationError::configuration(
                "ElevenLabs API key not configured",
            ));
        }
        Ok(Self {
            client: build_client(timeout)?,
            base_url: ELEVENLABS_API_URL.to_string(),
            api_key,
            model_id: ELEVENLABS_MODEL_ID.to_string(),
            voice_settings: VoiceSettings::default(),
        })
    }

    /// Create a client from `ELEVENLABS_API_KEY`
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty
    pub fn from_env(timeout: Duration) -> NarrationResult<Self> {
        let key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| NarrationError::configuration("ElevenLabs API key not configured"))?;
        Self::new(key, timeout)
    }

    /// Point the client at another base URL
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use another synthesis model
    #[must_use]
    pub fn with_model<S: Into<String>>(mut self, model_id: S) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Use other voice settings
    #[must_use]
    pub fn with_voice_settings(mut self, voice_settings: VoiceSettings) -> Self {
        self.voice_settings = voice_settings;
        self
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
    }
}

impl std::fmt::Debug for ElevenLabsSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsSynthesizer")
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("voice_settings", &self.voice_settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> NarrationResult<SynthesizedAudio> {
        let preview: String = request.text.chars().take(50).collect();
        info!("Generating speech for text: {}...", preview);

        let body = TextToSpeechBody {
            text: &request.text,
            model_id: &self.model_id,
            voice_settings: &self.voice_settings,
        };
        let response = self
            .client
            .post(self.endpoint(&request.voice_id))
            .header(XI_API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, AUDIO_MPEG)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, "ElevenLabs API error: {}", detail);
            if detail.contains(PROVIDER_QUOTA_MARKER) {
                return Err(NarrationError::quota_exhausted(QUOTA_MESSAGE));
            }
            return Err(NarrationError::synthesis(format!(
                "Failed to generate speech: {detail}"
            )));
        }

        let bytes = response.bytes().await?;
        info!("Speech generated successfully, size: {}", bytes.len());
        Ok(SynthesizedAudio::mpeg(bytes.to_vec()))
    }
}
