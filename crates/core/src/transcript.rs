//! Transcript Store
//!
//! The running conversation of one interview session. Messages are only ever
//! appended; their order is the conversation order and is replayed into every
//! subsequent prompt. Sessions are addressed by a [`SessionKey`] so that
//! concurrent interviews never share storage.

use crate::{error::PersistenceError, interview::InterviewKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "AI", alias = "ai", alias = "assistant")]
    Assistant,
}

impl Sender {
    /// The role label used when the transcript is rendered into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Assistant",
        }
    }
}

/// Details of the recording a spoken answer was transcribed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file_size: Option<u64>,
}

/// One entry of a session transcript.
///
/// Assistant entries hold the serialized [`crate::reply::InterpretedReply`],
/// user entries hold the raw utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: Sender,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AudioMetadata>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            from: Sender::User,
            message: text.into(),
            timestamp: Some(Utc::now()),
            metadata: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            from: Sender::Assistant,
            message: text.into(),
            timestamp: Some(Utc::now()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<AudioMetadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Identifies one interview session's transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub kind: InterviewKind,
    pub id: Uuid,
}

impl SessionKey {
    pub fn new(kind: InterviewKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// A key for a brand-new session of the given kind.
    pub fn generate(kind: InterviewKind) -> Self {
        Self::new(kind, Uuid::new_v4())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Append-only, session-keyed storage for chat transcripts.
///
/// Implementations assume a single writer per key.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Appends `messages` in order as a single write. On error none of them
    /// are persisted.
    async fn append_all(
        &self,
        key: &SessionKey,
        messages: &[ChatMessage],
    ) -> Result<(), PersistenceError>;

    /// Appends one message.
    async fn append(&self, key: &SessionKey, message: ChatMessage) -> Result<(), PersistenceError> {
        self.append_all(key, std::slice::from_ref(&message)).await
    }

    /// Loads the whole transcript in append order.
    ///
    /// Absent or unreadable storage yields an empty transcript.
    async fn load_all(&self, key: &SessionKey) -> Vec<ChatMessage>;

    /// Deletes the whole transcript for `key`.
    async fn reset(&self, key: &SessionKey) -> Result<(), PersistenceError>;
}

/// A process-local store. Used in tests and for deployments that do not need
/// transcripts to survive a restart.
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    sessions: Mutex<HashMap<SessionKey, Vec<ChatMessage>>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn append_all(
        &self,
        key: &SessionKey,
        messages: &[ChatMessage],
    ) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(*key)
            .or_default()
            .extend(messages.iter().cloned());
        Ok(())
    }

    async fn load_all(&self, key: &SessionKey) -> Vec<ChatMessage> {
        let sessions = self.sessions.lock().await;
        sessions.get(key).cloned().unwrap_or_default()
    }

    async fn reset(&self, key: &SessionKey) -> Result<(), PersistenceError> {
        self.sessions.lock().await.remove(key);
        Ok(())
    }
}
