//! File-backed persistence
//!
//! Each session transcript is one JSON array document at
//! `<data_dir>/<kind>/<id>.json`; a session's code submission lives next to
//! it at `<data_dir>/<kind>/<id>.code.json`. Writes go through a temporary
//! file and an atomic rename, serialized by an async mutex.

use async_trait::async_trait;
use bullaio_core::{
    code_review::CodeSubmission,
    error::PersistenceError,
    transcript::{ChatMessage, SessionKey, TranscriptStore},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn transcript_path(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join(key.kind.as_str())
            .join(format!("{}.json", key.id))
    }

    fn code_path(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join(key.kind.as_str())
            .join(format!("{}.code.json", key.id))
    }

    /// Whether a transcript document exists for `key`.
    pub async fn exists(&self, key: &SessionKey) -> bool {
        fs::try_exists(self.transcript_path(key))
            .await
            .unwrap_or(false)
    }

    /// Stores a code submission, replacing any previous one.
    pub async fn save_code(
        &self,
        key: &SessionKey,
        submission: &CodeSubmission,
    ) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.code_path(key), submission).await
    }

    /// The stored code submission, if any.
    pub async fn load_code(&self, key: &SessionKey) -> Option<CodeSubmission> {
        read_document(&self.code_path(key)).await
    }

    /// Removes a session's transcript and code submission.
    pub async fn delete(&self, key: &SessionKey) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        remove_if_present(&self.transcript_path(key)).await?;
        remove_if_present(&self.code_path(key)).await
    }
}

#[async_trait]
impl TranscriptStore for FileStore {
    async fn append_all(
        &self,
        key: &SessionKey,
        messages: &[ChatMessage],
    ) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let path = self.transcript_path(key);
        let mut transcript: Vec<ChatMessage> = read_document(&path).await.unwrap_or_default();
        transcript.extend_from_slice(messages);
        write_atomic(&path, &transcript).await?;
        debug!(session = %key, len = transcript.len(), "Transcript written");
        Ok(())
    }

    async fn load_all(&self, key: &SessionKey) -> Vec<ChatMessage> {
        read_document(&self.transcript_path(key))
            .await
            .unwrap_or_default()
    }

    async fn reset(&self, key: &SessionKey) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        remove_if_present(&self.transcript_path(key)).await
    }
}

/// Reads a JSON document. Absent, empty and unreadable documents all read as
/// `None`.
async fn read_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read document");
            return None;
        }
    };
    if content.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt document");
            None
        }
    }
}

async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<(), PersistenceError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullaio_core::{
        code_review::CodeAnalysis,
        interview::InterviewKind,
        transcript::{AudioMetadata, Sender},
    };
    use tempfile::TempDir;

    fn key() -> SessionKey {
        SessionKey::generate(InterviewKind::Behavioral)
    }

    #[tokio::test]
    async fn test_absent_transcript_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let key = key();
        assert!(store.load_all(&key).await.is_empty());
        assert!(!store.exists(&key).await);
    }

    #[tokio::test]
    async fn test_append_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let key = key();
        {
            let store = FileStore::new(dir.path());
            store.reset(&key).await.unwrap();
            store.append(&key, ChatMessage::assistant("Why us?")).await.unwrap();
            store
                .append_all(&key, &[ChatMessage::user("Because."), ChatMessage::assistant("Ok.")])
                .await
                .unwrap();
        }

        let reopened = FileStore::new(dir.path());
        let transcript = reopened.load_all(&key).await;
        let texts: Vec<&str> = transcript.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["Why us?", "Because.", "Ok."]);
        assert_eq!(transcript[1].from, Sender::User);

        let path = dir
            .path()
            .join("behavioral")
            .join(format!("{}.json", key.id));
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_transcript_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let key = key();
        let path = store.transcript_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[{\"from\": \"user\", \"mess").unwrap();

        assert!(store.load_all(&key).await.is_empty());
        store.append(&key, ChatMessage::user("fresh start")).await.unwrap();
        assert_eq!(store.load_all(&key).await.len(), 1);
    }

    #[tokio::test]
    async fn test_audio_metadata_survives_later_appends() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let key = key();
        let path = store.transcript_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[
                {"from": "AI", "message": "Why us?"},
                {"from": "user", "message": "I like the team.", "timestamp": "2026-10-19T09:30:00Z",
                 "metadata": {"audioFileName": "answer.webm", "audioFileType": "audio/webm", "audioFileSize": 5120}}
            ]"#,
        )
        .unwrap();

        let spoken = ChatMessage::user("And the mission.").with_metadata(Some(AudioMetadata {
            audio_file_name: Some("second.webm".to_string()),
            audio_file_type: Some("audio/webm".to_string()),
            audio_file_size: Some(2048),
        }));
        store
            .append_all(&key, &[spoken.clone(), ChatMessage::assistant("Tell me more.")])
            .await
            .unwrap();

        let transcript = store.load_all(&key).await;
        assert_eq!(transcript.len(), 4);
        let first = transcript[1].metadata.as_ref().unwrap();
        assert_eq!(first.audio_file_name.as_deref(), Some("answer.webm"));
        assert_eq!(first.audio_file_size, Some(5120));
        assert_eq!(transcript[2], spoken);
        assert_eq!(transcript[0].metadata, None);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""audioFileName": "answer.webm""#));
        assert!(!raw.contains(r#""metadata": null"#));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let a = key();
        let b = SessionKey::new(InterviewKind::Technical, a.id);

        store.append(&a, ChatMessage::user("behavioral")).await.unwrap();
        store.append(&b, ChatMessage::user("technical")).await.unwrap();
        store.reset(&a).await.unwrap();

        assert!(store.load_all(&a).await.is_empty());
        assert_eq!(store.load_all(&b).await[0].message, "technical");
    }

    #[tokio::test]
    async fn test_code_submission_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let key = SessionKey::generate(InterviewKind::Technical);
        assert!(store.load_code(&key).await.is_none());

        let submission = CodeSubmission::new("fn main() {}")
            .with_review(CodeAnalysis::default(), "# Report".to_string());
        store.save_code(&key, &submission).await.unwrap();
        assert_eq!(store.load_code(&key).await, Some(submission));

        store.append(&key, ChatMessage::user("hi")).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.load_code(&key).await.is_none());
        assert!(!store.exists(&key).await);
        store.delete(&key).await.unwrap();
    }
}
