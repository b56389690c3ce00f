//! Speech Bridge: text-to-speech through ElevenLabs.

use crate::error::SynthesisError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_TTS_MODEL: &str = "eleven_monolingual_v1";

/// Spoken instead of an empty reply.
pub const EMPTY_TEXT_PLACEHOLDER: &str = "No response available";

/// MIME type of synthesized audio.
pub const AUDIO_MIME: &str = "audio/mpeg";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.5,
        }
    }
}

/// Body of a text-to-speech request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtsRequest {
    pub text: String,
    pub model_id: String,
    pub voice_settings: VoiceSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub voice_id: String,
    pub model_id: String,
    pub settings: VoiceSettings,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_TTS_MODEL.to_string(),
            settings: VoiceSettings::default(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Converts `request` to audio spoken by `voice_id`.
    async fn convert(&self, voice_id: &str, request: &TtsRequest) -> Result<Bytes, SynthesisError>;
}

/// ElevenLabs streaming text-to-speech endpoint.
pub struct ElevenLabsTts {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsTts {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, ELEVENLABS_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TtsBackend for ElevenLabsTts {
    async fn convert(&self, voice_id: &str, request: &TtsRequest) -> Result<Bytes, SynthesisError> {
        let url = format!("{}/v1/text-to-speech/{voice_id}/stream", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, AUDIO_MIME)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut audio = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
        }
        debug!(bytes = audio.len(), "Received synthesized audio");
        Ok(audio.freeze())
    }
}

pub struct SpeechBridge {
    backend: Box<dyn TtsBackend>,
    voice: VoiceConfig,
}

impl SpeechBridge {
    pub fn new(backend: Box<dyn TtsBackend>, voice: VoiceConfig) -> Self {
        Self { backend, voice }
    }

    /// Synthesizes `text` as MPEG audio. No retry, no caching.
    #[instrument(skip_all, fields(voice = %self.voice.voice_id))]
    pub async fn synthesize(&self, text: &str) -> Result<Bytes, SynthesisError> {
        let text = if text.trim().is_empty() {
            EMPTY_TEXT_PLACEHOLDER
        } else {
            text
        };
        let request = TtsRequest {
            text: text.to_string(),
            model_id: self.voice.model_id.clone(),
            voice_settings: self.voice.settings,
        };
        let audio = self.backend.convert(&self.voice.voice_id, &request).await?;
        info!(chars = text.chars().count(), bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = TtsRequest {
            text: "Hello".to_string(),
            model_id: DEFAULT_TTS_MODEL.to_string(),
            voice_settings: VoiceSettings::default(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "text": "Hello",
                "model_id": "eleven_monolingual_v1",
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.5}
            })
        );
    }

    #[tokio::test]
    async fn test_synthesize_passes_voice_and_text() {
        let mut backend = MockTtsBackend::new();
        backend
            .expect_convert()
            .withf(|voice_id, request| {
                voice_id == DEFAULT_VOICE_ID
                    && request.text == "Tell me more."
                    && request.model_id == DEFAULT_TTS_MODEL
            })
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(b"ID3audio")));
        let bridge = SpeechBridge::new(Box::new(backend), VoiceConfig::default());

        let audio = bridge.synthesize("Tell me more.").await.unwrap();
        assert_eq!(&audio[..], b"ID3audio");
    }

    #[tokio::test]
    async fn test_synthesize_replaces_blank_text() {
        let mut backend = MockTtsBackend::new();
        backend
            .expect_convert()
            .withf(|_, request| request.text == EMPTY_TEXT_PLACEHOLDER)
            .times(2)
            .returning(|_, _| Ok(Bytes::from_static(b"audio")));
        let bridge = SpeechBridge::new(Box::new(backend), VoiceConfig::default());

        assert!(bridge.synthesize("").await.is_ok());
        assert!(bridge.synthesize("  \n ").await.is_ok());
    }

    #[tokio::test]
    async fn test_synthesize_propagates_backend_failure() {
        let mut backend = MockTtsBackend::new();
        backend.expect_convert().returning(|_, _| {
            Err(SynthesisError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            })
        });
        let bridge = SpeechBridge::new(Box::new(backend), VoiceConfig::default());

        let err = bridge.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, SynthesisError::Status { status: 401, .. }));
    }
}
