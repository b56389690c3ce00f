//! The typed form of a model reply.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Spoken when nothing usable could be recovered from the model output.
pub const FALLBACK_MESSAGE: &str = "Unable to generate a clear response";

/// Upper bound on a message recovered by the regex fallback.
pub const MAX_MESSAGE_CHARS: usize = 100;

/// The action tag of a reply: continue, ask for elaboration, or conclude.
///
/// Behavioral interviews use `FOLLOW_UP`, `REFLECTION` and `COMPLETE`;
/// technical interviews use `FOLLOW_UP`, `GUIDANCE` and `READY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[default]
    FollowUp,
    Reflection,
    Guidance,
    Complete,
    Ready,
}

impl Action {
    /// Parses a tag as the model wrote it. Case, surrounding whitespace and
    /// `-`/space separators are ignored; anything unrecognised is a follow-up.
    pub fn parse_lenient(tag: &str) -> Self {
        let normalized: String = tag
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match normalized.as_str() {
            "REFLECTION" => Action::Reflection,
            "GUIDANCE" => Action::Guidance,
            "COMPLETE" => Action::Complete,
            "READY" => Action::Ready,
            _ => Action::FollowUp,
        }
    }

    /// Whether this tag ends the conversation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Complete | Action::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FollowUp => "FOLLOW_UP",
            Action::Reflection => "REFLECTION",
            Action::Guidance => "GUIDANCE",
            Action::Complete => "COMPLETE",
            Action::Ready => "READY",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coaching feedback on the candidate's answer. Behavioral replies fill
/// `strength` and `improvement`; technical replies fill `logic`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strength: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub improvement: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logic: String,
}

impl Feedback {
    fn from_value(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            strength: field("strength"),
            improvement: field("improvement"),
            logic: field("logic"),
        }
    }
}

/// A model reply after parsing and, if needed, repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretedReply {
    pub action: Action,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, alias = "user_response", alias = "user_solution")]
    pub feedback: Feedback,
}

impl InterpretedReply {
    /// The opening turn of a session: the interviewer asks `question`.
    pub fn question(question: impl Into<String>) -> Self {
        Self::follow_up(question)
    }

    /// A follow-up reply carrying only a message.
    pub fn follow_up(message: impl Into<String>) -> Self {
        Self {
            action: Action::FollowUp,
            message: message.into(),
            thinking: None,
            feedback: Feedback::default(),
        }
    }

    /// The degraded reply used when nothing could be recovered.
    pub fn fallback() -> Self {
        Self::follow_up(FALLBACK_MESSAGE)
    }

    /// Builds a reply from a parsed JSON object.
    ///
    /// Returns `None` when the object has no non-empty `message` string.
    pub fn from_object(object: &Map<String, Value>) -> Option<Self> {
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())?
            .to_string();

        let action = object
            .get("action")
            .and_then(Value::as_str)
            .map(Action::parse_lenient)
            .unwrap_or_default();

        let thinking = object
            .get("thinking")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);

        let feedback = ["feedback", "user_response", "user_solution"]
            .iter()
            .find_map(|key| object.get(*key).filter(|v| v.is_object()))
            .map(Feedback::from_value)
            .unwrap_or_default();

        Some(Self {
            action,
            message,
            thinking,
            feedback,
        })
    }

    /// The serialized form appended to the transcript as an assistant message.
    pub fn to_transcript_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_parse_lenient() {
        assert_eq!(Action::parse_lenient("READY"), Action::Ready);
        assert_eq!(Action::parse_lenient(" complete "), Action::Complete);
        assert_eq!(Action::parse_lenient("follow-up"), Action::FollowUp);
        assert_eq!(Action::parse_lenient("Guidance"), Action::Guidance);
        assert_eq!(Action::parse_lenient("reflection"), Action::Reflection);
        assert_eq!(Action::parse_lenient("DANCE"), Action::FollowUp);
        assert_eq!(Action::parse_lenient(""), Action::FollowUp);
    }

    #[test]
    fn test_terminal_actions() {
        assert!(Action::Complete.is_terminal());
        assert!(Action::Ready.is_terminal());
        assert!(!Action::FollowUp.is_terminal());
        assert!(!Action::Reflection.is_terminal());
        assert!(!Action::Guidance.is_terminal());
    }

    #[test]
    fn test_action_serializes_as_tag() {
        assert_eq!(
            serde_json::to_string(&Action::FollowUp).unwrap(),
            "\"FOLLOW_UP\""
        );
        assert_eq!(Action::Ready.to_string(), "READY");
    }

    #[test]
    fn test_from_object_reads_behavioral_feedback() {
        let value = json!({
            "action": "REFLECTION",
            "thinking": "Candidate skipped the result.",
            "message": "What was the outcome?",
            "user_response": { "strength": "Clear context", "improvement": "State the result" }
        });
        let reply = InterpretedReply::from_object(value.as_object().unwrap()).unwrap();

        assert_eq!(reply.action, Action::Reflection);
        assert_eq!(reply.message, "What was the outcome?");
        assert_eq!(reply.thinking.as_deref(), Some("Candidate skipped the result."));
        assert_eq!(reply.feedback.strength, "Clear context");
        assert_eq!(reply.feedback.improvement, "State the result");
    }

    #[test]
    fn test_from_object_reads_technical_feedback() {
        let value = json!({
            "action": "GUIDANCE",
            "message": "Consider a hash map.",
            "user_solution": { "logic": "Nested loops, O(n^2)" }
        });
        let reply = InterpretedReply::from_object(value.as_object().unwrap()).unwrap();
        assert_eq!(reply.action, Action::Guidance);
        assert_eq!(reply.feedback.logic, "Nested loops, O(n^2)");
    }

    #[test]
    fn test_from_object_requires_message() {
        let missing = json!({ "action": "READY" });
        assert!(InterpretedReply::from_object(missing.as_object().unwrap()).is_none());

        let blank = json!({ "action": "READY", "message": "   " });
        assert!(InterpretedReply::from_object(blank.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_transcript_text_omits_empty_fields() {
        let text = InterpretedReply::question("Tell me about a conflict.").to_transcript_text();
        assert_eq!(
            text,
            r#"{"action":"FOLLOW_UP","message":"Tell me about a conflict.","feedback":{}}"#
        );

        let parsed: InterpretedReply = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, InterpretedReply::question("Tell me about a conflict."));
    }
}
