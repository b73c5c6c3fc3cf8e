//! Server side of the text-to-speech relay.
//!
//! Transport agnostic: feed it the request body, get back a status code and a
//! JSON body. The body shapes match what [`crate::RelaySynthesizer`] parses.

use crate::config::DEFAULT_VOICE_ID;
use crate::error::NarrationError;
use crate::synthesis::{SpeechSynthesizer, SynthesisRequest, QUOTA_MARKER};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Incoming relay request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Text to speak
    #[serde(default)]
    pub text: Option<String>,
    /// Voice profile, Rachel when absent
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// Relay response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayResponse {
    /// Synthesized audio
    Audio {
        /// Base64 encoded MP3
        #[serde(rename = "audioContent")]
        audio_content: String,
    },
    /// Failure description
    Error {
        /// Error message; quota failures start with `QUOTA_EXCEEDED`
        error: String,
    },
}

impl RelayResponse {
    /// HTTP status code for this response
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Audio { .. } => 200,
            Self::Error { .. } => 500,
        }
    }

    fn from_error(err: &NarrationError) -> Self {
        let message = if err.is_quota_exhausted() {
            format!("{QUOTA_MARKER}: {}", err.message())
        } else {
            err.message().to_string()
        };
        Self::Error { error: message }
    }
}

/// Handle a decoded relay request
pub async fn handle(synthesizer: &dyn SpeechSynthesizer, request: RelayRequest) -> RelayResponse {
    let Some(text) = request.text.filter(|text| !text.is_empty()) else {
        error!("Relay request without text");
        return RelayResponse::Error {
            error: "Text is required".to_string(),
        };
    };
    let voice_id = request
        .voice_id
        .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());

    match synthesizer
        .synthesize(&SynthesisRequest::new(text, voice_id))
        .await
    {
        Ok(audio) => {
            info!(
                backend = synthesizer.name(),
                "Relay produced {} bytes of audio",
                audio.len()
            );
            RelayResponse::Audio {
                audio_content: audio.to_base64(),
            }
        }
        Err(err) => {
            error!(backend = synthesizer.name(), "Error in text-to-speech relay: {}", err);
            RelayResponse::from_error(&err)
        }
    }
}

/// Handle a raw JSON request body, returning the status code and JSON reply
pub async fn handle_body(synthesizer: &dyn SpeechSynthesizer, body: &[u8]) -> (u16, String) {
    let response = match serde_json::from_slice::<RelayRequest>(body) {
        Ok(request) => handle(synthesizer, request).await,
        Err(err) => RelayResponse::Error {
            error: format!("Invalid request body: {err}"),
        },
    };
    let json = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"error":"Unknown error occurred"}"#.to_string());
    (response.status_code(), json)
}
