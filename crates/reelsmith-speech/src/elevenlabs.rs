//! ElevenLabs text-to-speech client.
//!
//! Uses the `with-timestamps` endpoint, which returns the audio as base64
//! together with a per-character timing alignment.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reelsmith_models::CharacterAlignment;

use crate::error::{SpeechError, SpeechResult};
use crate::{AlignmentProvider, Synthesis};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the ElevenLabs client.
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    /// API root, overridable for tests and proxies
    pub base_url: String,
    pub model_id: String,
    pub output_format: String,
    pub timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> SpeechResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| SpeechError::config("ELEVENLABS_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("ELEVENLABS_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("ELEVENLABS_MODEL_ID") {
            config.model_id = model;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TimestampedResponse {
    audio_base64: String,
    #[serde(default)]
    alignment: Option<CharacterAlignment>,
    #[serde(default)]
    normalized_alignment: Option<CharacterAlignment>,
}

/// ElevenLabs API client.
#[derive(Clone)]
pub struct ElevenLabsClient {
    config: ElevenLabsConfig,
    client: Client,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> SpeechResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SpeechError::config("ElevenLabs API key is empty"));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> SpeechResult<Self> {
        Self::new(ElevenLabsConfig::from_env()?)
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}/with-timestamps",
            self.config.base_url.trim_end_matches('/'),
            voice_id
        )
    }
}

#[async_trait]
impl AlignmentProvider for ElevenLabsClient {
    async fn get_alignment(&self, text: &str, voice_id: &str) -> SpeechResult<Synthesis> {
        if voice_id.trim().is_empty() {
            return Err(SpeechError::config("voice_id is empty"));
        }

        debug!(voice_id, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .client
            .post(self.endpoint(voice_id))
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.config.api_key)
            .json(&SynthesisRequest {
                text,
                model_id: &self.config.model_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api { status, body });
        }

        let payload: TimestampedResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::invalid_response(format!("unexpected body: {}", e)))?;

        let alignment = payload
            .alignment
            .or(payload.normalized_alignment)
            .ok_or_else(|| SpeechError::invalid_response("response has no alignment"))?;

        let audio = STANDARD.decode(payload.audio_base64.as_bytes())?;
        if audio.is_empty() {
            return Err(SpeechError::invalid_response("response has no audio"));
        }

        info!(
            voice_id,
            audio_bytes = audio.len(),
            characters = alignment.len(),
            "Speech synthesized"
        );
        Ok(Synthesis { audio, alignment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ElevenLabsClient {
        ElevenLabsClient::new(ElevenLabsConfig::new("test-key").with_base_url(server.uri())).unwrap()
    }

    fn body(audio: &[u8]) -> serde_json::Value {
        json!({
            "audio_base64": STANDARD.encode(audio),
            "alignment": {
                "characters": ["h", "i", " ", "y", "o"],
                "character_start_times_seconds": [0.0, 0.1, 0.2, 0.3, 0.4],
                "character_end_times_seconds": [0.1, 0.2, 0.3, 0.4, 0.5]
            }
        })
    }

    #[tokio::test]
    async fn test_synthesis_returns_audio_and_alignment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1/with-timestamps"))
            .and(header("xi-api-key", "test-key"))
            .and(query_param("output_format", DEFAULT_OUTPUT_FORMAT))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(b"ID3audio")))
            .expect(1)
            .mount(&server)
            .await;

        let synthesis = client_for(&server).get_alignment("hi yo", "voice-1").await.unwrap();

        assert_eq!(synthesis.audio, b"ID3audio");
        assert_eq!(synthesis.alignment.len(), 5);
        assert!(synthesis.alignment.is_consistent());
    }

    #[tokio::test]
    async fn test_api_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_alignment("hi", "voice-1").await.unwrap_err();
        match err {
            SpeechError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_alignment_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "audio_base64": "SUQz" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).get_alignment("hi", "voice-1").await.unwrap_err();
        assert_eq!(err.kind(), reelsmith_models::ErrorKind::AlignmentParse);
    }

    #[tokio::test]
    async fn test_bad_base64_is_decode_error() {
        let server = MockServer::start().await;
        let mut payload = body(b"x");
        payload["audio_base64"] = json!("!!not base64!!");
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let err = client_for(&server).get_alignment("hi", "voice-1").await.unwrap_err();
        assert!(matches!(err, SpeechError::Decode(_)));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(ElevenLabsClient::new(ElevenLabsConfig::new("  ")).is_err());
    }
}
