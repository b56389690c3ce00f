//! End-of-interview feedback summaries.
//!
//! Once a session is over the whole transcript, and for technical interviews
//! the submitted code with its review, is handed to the model in one
//! free-text completion.

use crate::{
    code_review::CodeSubmission,
    error::ModelCallError,
    interview::InterviewKind,
    llm_client::{CompletionRequest, LlmClient},
    prompt::{HISTORY_PLACEHOLDER, format_history, substitute},
    transcript::ChatMessage,
};
use std::sync::Arc;
use tracing::{info, instrument};

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that creates concise summaries with specific examples.";

/// Completion budget for a summary.
pub const SUMMARY_MAX_TOKENS: u32 = 1000;

const CODE_KEY: &str = "user_code";
const REVIEW_KEY: &str = "code_report";

const NO_CODE: &str = "No code was submitted.";
const NO_REVIEW: &str = "The code was not reviewed.";

pub const DEFAULT_BEHAVIORAL_SUMMARY_TEMPLATE: &str = "Summarize this behavioral interview practice session for the candidate.

List their strongest answers and the areas to improve, quoting specific moments from the conversation. Finish with three concrete tips for the next interview.

Interview transcript:
{chat_history}";

pub const DEFAULT_TECHNICAL_SUMMARY_TEMPLATE: &str = "Summarize this technical interview practice session for the candidate.

Cover how they reasoned about the problem in conversation, the quality of the code they submitted and what the review found. Finish with three concrete tips for the next interview.

Interview transcript:
{chat_history}

Submitted code:
{user_code}

Code review:
{code_report}";

/// The built-in summary template of `kind`.
pub fn default_summary_template(kind: InterviewKind) -> &'static str {
    match kind {
        InterviewKind::Behavioral => DEFAULT_BEHAVIORAL_SUMMARY_TEMPLATE,
        InterviewKind::Technical => DEFAULT_TECHNICAL_SUMMARY_TEMPLATE,
    }
}

/// Fills `{chat_history}`, `{user_code}` and `{code_report}` in a single
/// pass. A template without `{chat_history}` gets the transcript appended.
pub fn render_summary_prompt(
    template: &str,
    transcript: &[ChatMessage],
    code: Option<&CodeSubmission>,
) -> String {
    let history = format_history(transcript);
    let user_code = code.map_or(NO_CODE, |c| c.code.as_str());
    let report = code
        .and_then(|c| c.report.as_deref())
        .unwrap_or(NO_REVIEW);

    let mut prompt = substitute(template, ("{", "}"), |name| match name {
        HISTORY_PLACEHOLDER => Some(history.as_str()),
        CODE_KEY => Some(user_code),
        REVIEW_KEY => Some(report),
        _ => None,
    });
    if !template.contains(&format!("{{{HISTORY_PLACEHOLDER}}}")) {
        prompt.push_str("\n\nInterview transcript:\n");
        prompt.push_str(&history);
    }
    prompt
}

pub struct InterviewSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl InterviewSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Writes the feedback summary of a finished (or abandoned) session.
    #[instrument(skip_all, fields(messages = transcript.len(), with_code = code.is_some()))]
    pub async fn summarize(
        &self,
        template: &str,
        transcript: &[ChatMessage],
        code: Option<&CodeSubmission>,
    ) -> Result<String, ModelCallError> {
        let prompt = render_summary_prompt(template, transcript, code);
        let request = CompletionRequest::new(SUMMARY_SYSTEM_PROMPT, prompt)
            .with_max_tokens(Some(SUMMARY_MAX_TOKENS));
        let summary = self.llm.complete(request).await?;
        info!(chars = summary.len(), "Interview summary generated");
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{DEFAULT_TEMPERATURE, MockLlmClient};
    use crate::reply::InterpretedReply;

    fn transcript() -> Vec<ChatMessage> {
        vec![
            ChatMessage::assistant(InterpretedReply::question("Two Sum").to_transcript_text()),
            ChatMessage::user("I'd use a hash map."),
        ]
    }

    #[test]
    fn test_technical_prompt_includes_code_and_review() {
        let code = CodeSubmission {
            report: Some("## Quality Assessment\nHIGH".to_string()),
            ..CodeSubmission::new("def two_sum(): ...")
        };
        let prompt = render_summary_prompt(
            DEFAULT_TECHNICAL_SUMMARY_TEMPLATE,
            &transcript(),
            Some(&code),
        );
        assert!(prompt.contains("Assistant: Two Sum\nUser: I'd use a hash map."));
        assert!(prompt.contains("Submitted code:\ndef two_sum(): ..."));
        assert!(prompt.contains("Code review:\n## Quality Assessment\nHIGH"));
    }

    #[test]
    fn test_missing_code_and_history_placeholder() {
        let prompt = render_summary_prompt("Code: {user_code} {code_report}", &transcript(), None);
        assert_eq!(
            prompt,
            "Code: No code was submitted. The code was not reviewed.\n\nInterview transcript:\nAssistant: Two Sum\nUser: I'd use a hash map."
        );
    }

    #[test]
    fn test_answers_are_not_expanded() {
        let transcript = vec![ChatMessage::user("my code is {user_code}")];
        let prompt = render_summary_prompt("{chat_history}", &transcript, None);
        assert_eq!(prompt, "User: my code is {user_code}");
    }

    #[tokio::test]
    async fn test_summarize_sends_plain_completion() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .withf(|request| {
                request.system_prompt == SUMMARY_SYSTEM_PROMPT
                    && request.user_message.contains("User: I'd use a hash map.")
                    && request.function.is_none()
                    && request.max_tokens == Some(SUMMARY_MAX_TOKENS)
                    && request.temperature == DEFAULT_TEMPERATURE
            })
            .times(1)
            .returning(|_| Ok("  Strong start. Practice edge cases.\n".to_string()));
        let summarizer = InterviewSummarizer::new(Arc::new(llm));

        let summary = summarizer
            .summarize(DEFAULT_BEHAVIORAL_SUMMARY_TEMPLATE, &transcript(), None)
            .await
            .unwrap();
        assert_eq!(summary, "Strong start. Practice edge cases.");
    }

    #[tokio::test]
    async fn test_summarize_propagates_upstream_failure() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Err(ModelCallError::EmptyResponse));
        let summarizer = InterviewSummarizer::new(Arc::new(llm));

        let result = summarizer
            .summarize(DEFAULT_BEHAVIORAL_SUMMARY_TEMPLATE, &transcript(), None)
            .await;
        assert!(matches!(result, Err(ModelCallError::EmptyResponse)));
    }
}
