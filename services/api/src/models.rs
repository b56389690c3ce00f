//! API Models
//!
//! Request payloads and response bodies of the REST API, annotated for
//! OpenAPI generation with `utoipa`.

use bullaio_core::{
    code_review::{CodeAnalysis, CodeSubmission},
    interview::InterviewKind,
    reply::{Action, Feedback},
    transcript::{AudioMetadata, ChatMessage, Sender},
    transcription::{Transcription, Word},
    turn::TurnState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct CreateSessionResponse {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(value_type = String, example = "behavioral")]
    pub kind: InterviewKind,
    /// The opening question, already stored as the first transcript entry.
    pub question: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct TranscriptEntry {
    #[schema(value_type = String, example = "AI")]
    pub from: Sender,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Present on answers transcribed from a recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<AudioMetadata>,
}

impl From<ChatMessage> for TranscriptEntry {
    fn from(msg: ChatMessage) -> Self {
        Self {
            from: msg.from,
            message: msg.message,
            timestamp: msg.timestamp,
            metadata: msg.metadata,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct TurnPayload {
    #[schema(example = "I split the migration into three phases and owned the rollback plan.")]
    pub prompt: String,
    /// Whether to synthesize the reply as speech. Defaults to true.
    #[serde(default)]
    pub speak: Option<bool>,
    /// The `audio` of a `/transcriptions` response when the prompt is a
    /// transcribed recording.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub audio: Option<AudioMetadata>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct TurnResponse {
    #[schema(value_type = String, example = "FOLLOW_UP")]
    pub action: Action,
    #[schema(value_type = String, example = "FOLLOW_UP")]
    pub state: TurnState,
    #[schema(value_type = String, example = "AWAITING_INPUT")]
    pub next_state: TurnState,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[schema(value_type = Object)]
    pub feedback: Feedback,
    /// Base64 of the spoken reply, absent when speech was skipped or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_mime: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SaveCodePayload {
    #[schema(example = "def two_sum(nums, target): ...")]
    pub code: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct CodeRecordResponse {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CodeRecordResponse {
    pub fn new(session_id: Uuid, submission: CodeSubmission) -> Self {
        Self {
            session_id,
            code: submission.code,
            report: submission.report,
            updated_at: submission.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct AnalyzeCodePayload {
    /// Code to analyze; the session's saved code is used when absent.
    #[serde(default)]
    pub code: Option<String>,
    /// Markdown report template with `{{key}}` placeholders.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct AnalysisResponse {
    pub report: String,
    #[schema(value_type = Object)]
    pub analysis: CodeAnalysis,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct SummaryResponse {
    #[schema(value_type = String, example = "technical")]
    pub kind: InterviewKind,
    /// Markdown feedback on the whole session.
    pub summary: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SpeechPayload {
    #[schema(example = "Tell me about a time you disagreed with a teammate.")]
    pub text: String,
}

/// Multipart upload of a recorded answer.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct TranscriptionUpload {
    #[schema(value_type = String, format = Binary)]
    pub audio: Vec<u8>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Distinct diarized speakers, in order of first appearance.
    pub speakers: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub words: Vec<Word>,
    /// The uploaded recording; send it back with the turn to keep it on the
    /// transcript entry.
    #[schema(value_type = Object)]
    pub audio: AudioMetadata,
}

impl TranscriptionResponse {
    pub fn new(transcription: Transcription, audio: AudioMetadata) -> Self {
        let speakers = transcription
            .speakers()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            text: transcription.text,
            language_code: transcription.language_code,
            speakers,
            words: transcription.words,
            audio,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
