//! Speech-to-text through ElevenLabs Scribe.

use crate::{error::TranscriptionError, speech::ELEVENLABS_BASE_URL, transcript::AudioMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

pub const DEFAULT_STT_MODEL: &str = "scribe_v1";
pub const DEFAULT_STT_LANGUAGE: &str = "eng";

/// A recorded answer uploaded by the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioUpload {
    pub fn new(bytes: impl Into<Bytes>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// What the transcript records about this recording.
    pub fn metadata(&self) -> AudioMetadata {
        AudioMetadata {
            audio_file_name: Some(self.file_name.clone()),
            audio_file_type: Some(self.mime_type.clone()),
            audio_file_size: Some(self.bytes.len() as u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Transcription {
    /// Distinct diarized speaker ids, in order of first appearance.
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = Vec::new();
        for id in self.words.iter().filter_map(|w| w.speaker_id.as_deref()) {
            if !speakers.contains(&id) {
                speakers.push(id);
            }
        }
        speakers
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<Transcription, TranscriptionError>;
}

pub struct ElevenLabsStt {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    language_code: String,
}

impl ElevenLabsStt {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: ELEVENLABS_BASE_URL.to_string(),
            api_key: api_key.into(),
            model_id: DEFAULT_STT_MODEL.to_string(),
            language_code: DEFAULT_STT_LANGUAGE.to_string(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>, language_code: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self.language_code = language_code.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn form(&self, audio: AudioUpload) -> Result<Form, TranscriptionError> {
        let file = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)?;
        Ok(Form::new()
            .part("file", file)
            .text("model_id", self.model_id.clone())
            .text("tag_audio_events", "true")
            .text("diarize", "true")
            .text("language_code", self.language_code.clone()))
    }
}

#[async_trait]
impl Transcriber for ElevenLabsStt {
    #[instrument(skip_all, fields(file = %audio.file_name, bytes = audio.bytes.len()))]
    async fn transcribe(&self, audio: AudioUpload) -> Result<Transcription, TranscriptionError> {
        if audio.bytes.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let response = self
            .http
            .post(format!("{}/v1/speech-to-text", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(self.form(audio)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let transcription: Transcription = response.json().await?;
        info!(
            chars = transcription.text.len(),
            speakers = transcription.speakers().len(),
            "Transcribed audio"
        );
        Ok(transcription)
    }
}
