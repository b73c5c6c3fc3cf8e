//! HTTP tests for the relay and ElevenLabs synthesizers.
//!
//! Each test stands up a [`wiremock`] server that plays the part of the
//! relay function or the ElevenLabs API.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use narration_core::relay::{self, RelayRequest, RelayResponse};
use narration_core::{
    ElevenLabsSynthesizer, NarrationConfig, NarrationEngine, NarrationError, RelaySynthesizer,
    SimulatedAudioDevice, SpeakOptions, SpeechSynthesizer, SynthesisRequest,
};

const TIMEOUT: Duration = Duration::from_secs(5);
const RELAY_PATH: &str = "/functions/v1/text-to-speech";

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn relay_client(server: &MockServer) -> RelaySynthesizer {
    RelaySynthesizer::new(format!("{}{RELAY_PATH}", server.uri()), TIMEOUT)
        .expect("Should build relay client")
}

fn elevenlabs_client(server: &MockServer) -> ElevenLabsSynthesizer {
    ElevenLabsSynthesizer::new("test-key", TIMEOUT)
        .expect("Should build ElevenLabs client")
        .with_base_url(server.uri())
}

// Relay synthesizer

#[tokio::test]
async fn test_relay_success_decodes_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .and(body_json(serde_json::json!({
            "text": "Hello there",
            "voiceId": "voice-1"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "audioContent": encode(b"ID3mp3") })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let audio = relay_client(&server)
        .synthesize(&SynthesisRequest::new("Hello there", "voice-1"))
        .await
        .expect("Should synthesize");

    assert_eq!(audio.bytes, b"ID3mp3");
    assert_eq!(audio.mime_type, "audio/mpeg");
}

#[tokio::test]
async fn test_relay_sends_api_key_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .and(header("authorization", "Bearer anon-key"))
        .and(header("apikey", "anon-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "audioContent": encode(b"ok") })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = relay_client(&server).with_api_key("anon-key");
    client
        .synthesize(&SynthesisRequest::new("Hi", "v"))
        .await
        .expect("Should send credentials");
}

#[tokio::test]
async fn test_relay_quota_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "QUOTA_EXCEEDED: ElevenLabs credits have been depleted"
        })))
        .mount(&server)
        .await;

    let err = relay_client(&server)
        .synthesize(&SynthesisRequest::new("Hi", "v"))
        .await
        .unwrap_err();

    assert!(err.is_quota_exhausted());
    assert_eq!(err.message(), "ElevenLabs credits have been depleted");
}

#[tokio::test]
async fn test_relay_generic_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "Failed to generate speech: invalid voice"
        })))
        .mount(&server)
        .await;

    let err = relay_client(&server)
        .synthesize(&SynthesisRequest::new("Hi", "v"))
        .await
        .unwrap_err();

    assert!(matches!(err, NarrationError::SynthesisError { .. }));
    assert!(err.message().contains("invalid voice"));
}

#[tokio::test]
async fn test_relay_non_json_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = relay_client(&server)
        .synthesize(&SynthesisRequest::new("Hi", "v"))
        .await
        .unwrap_err();

    assert!(err.message().contains("502"));
    assert!(err.message().contains("Bad Gateway"));
}

#[tokio::test]
async fn test_relay_missing_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let err = relay_client(&server)
        .synthesize(&SynthesisRequest::new("Hi", "v"))
        .await
        .unwrap_err();

    assert_eq!(err.message(), "No audio content received");
}

#[tokio::test]
async fn test_relay_unreachable_is_network_error() {
    let err = RelaySynthesizer::new(format!("http://127.0.0.1:1{RELAY_PATH}"), TIMEOUT)
        .unwrap()
        .synthesize(&SynthesisRequest::new("Hi", "v"))
        .await
        .unwrap_err();

    assert!(err.is_retriable());
}

// ElevenLabs synthesizer

#[tokio::test]
async fn test_elevenlabs_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .and(header("xi-api-key", "test-key"))
        .and(header("accept", "audio/mpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let audio = elevenlabs_client(&server)
        .synthesize(&SynthesisRequest::new("Hello", "voice-1"))
        .await
        .expect("Should synthesize");

    assert_eq!(audio.bytes, b"mp3-bytes");
}

#[tokio::test]
async fn test_elevenlabs_sends_model_and_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .and(body_json(serde_json::json!({
            "text": "Hello",
            "model_id": "eleven_turbo_v2_5",
            "voice_settings": {
                "stability": 0.7,
                "similarity_boost": 0.75,
                "style": 0.0,
                "use_speaker_boost": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    elevenlabs_client(&server)
        .synthesize(&SynthesisRequest::new("Hello", "voice-1"))
        .await
        .expect("Body should match");
}

#[tokio::test]
async fn test_elevenlabs_quota_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"detail":{"status":"quota_exceeded","message":"This request exceeds your quota."}}"#,
        ))
        .mount(&server)
        .await;

    let err = elevenlabs_client(&server)
        .synthesize(&SynthesisRequest::new("Hello", "voice-1"))
        .await
        .unwrap_err();

    assert!(err.is_quota_exhausted());
}

#[tokio::test]
async fn test_elevenlabs_generic_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("voice not found"))
        .mount(&server)
        .await;

    let err = elevenlabs_client(&server)
        .synthesize(&SynthesisRequest::new("Hello", "missing"))
        .await
        .unwrap_err();

    assert!(!err.is_quota_exhausted());
    assert_eq!(err.message(), "Failed to generate speech: voice not found");
}

// Relay server side backed by ElevenLabs

#[tokio::test]
async fn test_relay_handler_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"rachel".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = elevenlabs_client(&server);
    let response = relay::handle(
        &provider,
        RelayRequest {
            text: Some("Hello".to_string()),
            voice_id: None,
        },
    )
    .await;

    assert_eq!(
        response,
        RelayResponse::Audio {
            audio_content: encode(b"rachel")
        }
    );
}

#[tokio::test]
async fn test_relay_handler_marks_quota() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("quota_exceeded"))
        .mount(&server)
        .await;

    let provider = elevenlabs_client(&server);
    let (status, body) = relay::handle_body(&provider, br#"{"text":"Hello"}"#).await;

    assert_eq!(status, 500);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(value["error"]
        .as_str()
        .unwrap()
        .starts_with("QUOTA_EXCEEDED"));

    // What the relay emits, the relay client classifies.
    let relay_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&relay_server)
        .await;
    let err = relay_client(&relay_server)
        .synthesize(&SynthesisRequest::new("Hello", "v"))
        .await
        .unwrap_err();
    assert!(err.is_quota_exhausted());
}

// Engine over HTTP

#[test_log::test(tokio::test)]
async fn test_engine_speaks_through_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "audioContent": encode(b"tiny") })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let config = NarrationConfig {
        tts_url: format!("{}{RELAY_PATH}", server.uri()),
        segment_pause_ms: 10,
        ..NarrationConfig::default()
    };
    let synthesizer = Arc::new(RelaySynthesizer::from_config(&config).unwrap());
    let device = Arc::new(SimulatedAudioDevice::new());
    let engine = NarrationEngine::builder(synthesizer, device.clone())
        .config(config)
        .build()
        .unwrap();

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done_tx = parking_lot::Mutex::new(Some(done_tx));
    let options = SpeakOptions::new().on_end(move || {
        if let Some(tx) = done_tx.lock().take() {
            let _ = tx.send(());
        }
    });

    assert_eq!(engine.speak("First.|Second.", options), 2);
    // The first segment's delayed end fires before the second plays.
    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("Should finish a segment")
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while device.completed_count() < 2 || engine.is_speaking() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Should play both segments");
}
