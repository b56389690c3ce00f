//! Response Interpreter
//!
//! Sends an assembled prompt to the language model and turns whatever comes
//! back into an [`InterpretedReply`]. Once the model has answered with any
//! text at all, interpretation cannot fail: malformed output is repaired, and
//! if that does not work the reply degrades to a regex-extracted message or to
//! a fixed fallback.

use crate::{
    error::ModelCallError,
    interview::{InterviewKind, REPLY_FUNCTION_NAME},
    llm_client::{CompletionRequest, LlmClient, ReplyFunction},
    repair::repair,
    reply::{InterpretedReply, MAX_MESSAGE_CHARS},
};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static MESSAGE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""message"\s*:\s*"([^"]*)""#).expect("message pattern is valid")
});

/// Everything the interpreter needs for one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub kind: InterviewKind,
    /// The rendered system prompt.
    pub system_prompt: String,
    /// The raw user utterance, sent as the user turn.
    pub user_utterance: String,
}

pub struct ResponseInterpreter {
    llm: Arc<dyn LlmClient>,
}

impl ResponseInterpreter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Calls the model once and interprets its reply.
    ///
    /// Fails only when the completion call itself fails or returns no
    /// content.
    pub async fn interpret(&self, context: PromptContext) -> Result<InterpretedReply, ModelCallError> {
        let system_prompt = format!(
            "{}\n{}",
            context.system_prompt,
            context.kind.reply_instructions()
        );
        let request = CompletionRequest::new(system_prompt, context.user_utterance).with_function(
            ReplyFunction {
                name: REPLY_FUNCTION_NAME.to_string(),
                description: "Generate a structured interview response".to_string(),
                parameters: context.kind.reply_schema(),
            },
        );

        let raw = self.llm.complete(request).await?;
        if raw.trim().is_empty() {
            return Err(ModelCallError::EmptyResponse);
        }
        debug!(raw = %raw, "Model replied");

        let reply = interpret_raw(&raw);
        info!(action = %reply.action, kind = %context.kind, "Interpreted model reply");
        Ok(reply)
    }
}

/// Turns raw model output into a reply, degrading instead of failing.
pub fn interpret_raw(raw: &str) -> InterpretedReply {
    match repair(raw) {
        Ok(object) => {
            if let Some(reply) = InterpretedReply::from_object(&object) {
                return reply;
            }
            warn!("Model reply has no 'message' field");
        }
        Err(e) => warn!(error = %e, "Model reply could not be parsed as JSON"),
    }

    match extract_message(raw) {
        Some(message) => {
            debug!(%message, "Recovered message with regex fallback");
            InterpretedReply::follow_up(message)
        }
        None => {
            warn!("No message recoverable from model reply, using fallback");
            InterpretedReply::fallback()
        }
    }
}

/// Pulls the quoted value of the first `"message"` field out of `raw`,
/// truncated to [`MAX_MESSAGE_CHARS`] characters.
pub fn extract_message(raw: &str) -> Option<String> {
    let captured = MESSAGE_FIELD.captures(raw)?.get(1)?.as_str().trim();
    if captured.is_empty() {
        return None;
    }
    Some(captured.chars().take(MAX_MESSAGE_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLlmClient;
    use crate::reply::{Action, FALLBACK_MESSAGE};

    fn context(kind: InterviewKind) -> PromptContext {
        PromptContext {
            kind,
            system_prompt: "You are an interviewer.".to_string(),
            user_utterance: "I used a hash map.".to_string(),
        }
    }

    fn interpreter_returning(raw: &'static str) -> ResponseInterpreter {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .times(1)
            .returning(move |_| Ok(raw.to_string()));
        ResponseInterpreter::new(Arc::new(llm))
    }

    #[tokio::test]
    async fn test_interpret_sends_forced_function_and_user_turn() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .withf(|request| {
                request.user_message == "I used a hash map."
                    && request.system_prompt.starts_with("You are an interviewer.")
                    && request.system_prompt.contains("'READY'")
                    && request
                        .function
                        .as_ref()
                        .is_some_and(|f| f.name == REPLY_FUNCTION_NAME)
                    && request.temperature == 0.7
            })
            .times(1)
            .returning(|_| {
                Ok(r#"{"action":"GUIDANCE","message":"What is the lookup cost?","user_solution":{"logic":"Single pass"}}"#.to_string())
            });
        let interpreter = ResponseInterpreter::new(Arc::new(llm));

        let reply = interpreter
            .interpret(context(InterviewKind::Technical))
            .await
            .unwrap();
        assert_eq!(reply.action, Action::Guidance);
        assert_eq!(reply.message, "What is the lookup cost?");
        assert_eq!(reply.feedback.logic, "Single pass");
    }

    #[tokio::test]
    async fn test_interpret_repairs_trailing_comma() {
        let interpreter =
            interpreter_returning(r#"{"action": "FOLLOW_UP", "message": "Tell me more",}"#);
        let reply = interpreter
            .interpret(context(InterviewKind::Behavioral))
            .await
            .unwrap();
        assert_eq!(reply.action, Action::FollowUp);
        assert_eq!(reply.message, "Tell me more");
    }

    #[tokio::test]
    async fn test_interpret_repairs_truncated_output() {
        let interpreter = interpreter_returning(r#"{"action": "READY", "message": "Great job""#);
        let reply = interpreter
            .interpret(context(InterviewKind::Technical))
            .await
            .unwrap();
        assert_eq!(reply.action, Action::Ready);
        assert_eq!(reply.message, "Great job");
    }

    #[tokio::test]
    async fn test_interpret_falls_back_on_garbage() {
        let interpreter = interpreter_returning("I'd rather not answer in JSON today.");
        let reply = interpreter
            .interpret(context(InterviewKind::Behavioral))
            .await
            .unwrap();
        assert_eq!(reply.message, FALLBACK_MESSAGE);
        assert_eq!(reply.action, Action::FollowUp);
    }

    #[tokio::test]
    async fn test_interpret_propagates_model_errors() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Err(ModelCallError::EmptyResponse));
        let interpreter = ResponseInterpreter::new(Arc::new(llm));
        let result = interpreter.interpret(context(InterviewKind::Behavioral)).await;
        assert!(matches!(result, Err(ModelCallError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_interpret_treats_blank_output_as_empty_response() {
        let interpreter = interpreter_returning("   \n");
        let result = interpreter.interpret(context(InterviewKind::Behavioral)).await;
        assert!(matches!(result, Err(ModelCallError::EmptyResponse)));
    }

    #[test]
    fn test_regex_fallback_when_json_is_beyond_repair() {
        let raw = r#"{"action": "COMPLETE" "message": "Nice work on that answer" "extra": }"#;
        let reply = interpret_raw(raw);
        assert_eq!(reply.message, "Nice work on that answer");
        assert_eq!(reply.action, Action::FollowUp);
    }

    #[test]
    fn test_regex_fallback_when_message_missing_after_parse() {
        let reply = interpret_raw(r#"{"action": "COMPLETE", "msg": "hello"}"#);
        assert_eq!(reply.message, FALLBACK_MESSAGE);
    }

    #[test]
    fn test_extract_message_truncates_to_limit() {
        let long = "a".repeat(250);
        let raw = format!(r#"not json "message": "{long}""#);
        let message = extract_message(&raw).unwrap();
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_extract_message_rejects_empty_value() {
        assert_eq!(extract_message(r#""message": """#), None);
        assert_eq!(extract_message("nothing here"), None);
    }

    #[test]
    fn test_interpret_raw_never_returns_empty_message() {
        let inputs = [
            "{",
            "}",
            "[1, 2, 3]",
            r#"{"message": ""}"#,
            r#"{"message": 42}"#,
            "```json\n```",
            "null",
            r#"{"message": "ok""#,
        ];
        for raw in inputs {
            let reply = interpret_raw(raw);
            assert!(!reply.message.is_empty(), "empty message for {raw:?}");
        }
    }
}
