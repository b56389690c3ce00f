//! Prompt Assembler
//!
//! Renders a system prompt by substituting the transcript, the current
//! question and the latest user utterance into a template. Rendering is a pure
//! function of its inputs.

use crate::transcript::ChatMessage;
use serde_json::Value;
use std::borrow::Cow;

pub const HISTORY_PLACEHOLDER: &str = "chat_history";
pub const QUESTION_PLACEHOLDER: &str = "current_question";
pub const UTTERANCE_PLACEHOLDER: &str = "user_prompt";

/// A prompt template with `{chat_history}`, `{current_question}` and
/// `{user_prompt}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Placeholders this template never mentions.
    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        [HISTORY_PLACEHOLDER, QUESTION_PLACEHOLDER, UTTERANCE_PLACEHOLDER]
            .into_iter()
            .filter(|name| !self.text.contains(&format!("{{{name}}}")))
            .collect()
    }

    /// Renders the template. See [`render`].
    pub fn render(
        &self,
        transcript: &[ChatMessage],
        current_question: &str,
        user_utterance: &str,
    ) -> String {
        render(&self.text, transcript, current_question, user_utterance)
    }
}

/// Substitutes the formatted transcript, the question and the utterance into
/// `template`.
pub fn render(
    template: &str,
    transcript: &[ChatMessage],
    current_question: &str,
    user_utterance: &str,
) -> String {
    let history = format_history(transcript);
    substitute(template, ("{", "}"), |name| match name {
        HISTORY_PLACEHOLDER => Some(history.as_str()),
        QUESTION_PLACEHOLDER => Some(current_question),
        UTTERANCE_PLACEHOLDER => Some(user_utterance),
        _ => None,
    })
}

/// Formats a transcript as `Role: text` lines.
pub fn format_history(transcript: &[ChatMessage]) -> String {
    transcript
        .iter()
        .map(|msg| format!("{}: {}", msg.from.label(), spoken_text(&msg.message)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The text a transcript entry stands for: the `message` field of a
/// serialized reply, or the raw text when there is no such field.
pub fn spoken_text(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return Cow::Borrowed(text);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => match value.get("message").and_then(Value::as_str) {
            Some(message) if !message.is_empty() => Cow::Owned(message.to_string()),
            _ => Cow::Borrowed(text),
        },
        Err(_) => Cow::Borrowed(text),
    }
}

/// Single pass, left-to-right placeholder substitution between the `open`
/// and `close` delimiters. Text produced by a substitution is never scanned
/// again; unknown placeholders are kept.
pub(crate) fn substitute<'a>(
    template: &str,
    (open_delim, close_delim): (&str, &str),
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find(open_delim) {
        out.push_str(&rest[..open]);
        let after = &rest[open + open_delim.len()..];
        match after.find(close_delim) {
            Some(close) => match lookup(&after[..close]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[close + close_delim.len()..];
                }
                None => {
                    out.push_str(open_delim);
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
