//! Error types shared by the interview core.
//!
//! Malformed model output never shows up here: the repair ladder in
//! [`crate::repair`] absorbs it. What remains are failures of the services the
//! core talks to and of the transcript storage.

use async_openai::error::OpenAIError;

/// The language-model completion call failed or returned nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum ModelCallError {
    #[error("completion request failed: {0}")]
    Upstream(#[from] OpenAIError),
    #[error("completion response had neither content nor function-call arguments")]
    EmptyResponse,
}

/// The text-to-speech call failed.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("text-to-speech request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("text-to-speech service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// The speech-to-text call failed.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("speech-to-text request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("speech-to-text service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("audio upload is empty")]
    EmptyAudio,
}

/// Writing a transcript (or a code submission) to durable storage failed.
///
/// Reads never produce this error; an unreadable transcript is treated as a
/// fresh session.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("transcript could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}
