//! Interview kinds and their question banks.

use crate::reply::Action;
use rand::seq::IndexedRandom;
use regex::Regex;
use schemars::{JsonSchema, generate::SchemaSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr, sync::LazyLock};

/// Asked when a question bank turns out to be empty.
pub const DEFAULT_QUESTION: &str = "Tell me about a time when you demonstrated leadership skills.";

/// Name of the function the model is forced to call for every reply.
pub const REPLY_FUNCTION_NAME: &str = "provide_interview_response";

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("blank-line pattern is valid"));

/// The two interview flows. Each has its own prompt template, question bank
/// and set of action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewKind {
    Behavioral,
    Technical,
}

impl InterviewKind {
    pub const ALL: [InterviewKind; 2] = [InterviewKind::Behavioral, InterviewKind::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewKind::Behavioral => "behavioral",
            InterviewKind::Technical => "technical",
        }
    }

    /// File stem of the prompt template in the prompts directory.
    pub fn template_name(&self) -> &'static str {
        self.as_str()
    }

    /// File stem of the end-of-interview summary template.
    pub fn summary_template_name(&self) -> &'static str {
        match self {
            InterviewKind::Behavioral => "behavioral_summary",
            InterviewKind::Technical => "technical_summary",
        }
    }

    /// File name of the question bank in the prompts directory.
    pub fn question_file(&self) -> &'static str {
        match self {
            InterviewKind::Behavioral => "behavioral_questions.txt",
            InterviewKind::Technical => "technical_questions.txt",
        }
    }

    /// The action tags the model may answer with, continuing tag first and
    /// terminal tag last.
    pub fn actions(&self) -> [Action; 3] {
        match self {
            InterviewKind::Behavioral => [Action::FollowUp, Action::Reflection, Action::Complete],
            InterviewKind::Technical => [Action::FollowUp, Action::Guidance, Action::Ready],
        }
    }

    /// Parses a question bank file for this kind. Behavioral banks hold one
    /// question per paragraph; a technical bank is a single problem statement.
    pub fn question_bank(&self, text: &str) -> QuestionBank {
        match self {
            InterviewKind::Behavioral => QuestionBank::from_paragraphs(text),
            InterviewKind::Technical => QuestionBank::single(text),
        }
    }

    /// JSON schema of the reply arguments, used as the parameters of the
    /// forced function call.
    pub fn reply_schema(&self) -> Value {
        match self {
            InterviewKind::Behavioral => inline_schema::<BehavioralReplyArgs>(),
            InterviewKind::Technical => inline_schema::<TechnicalReplyArgs>(),
        }
    }

    /// Plain-text description of the expected JSON, appended to the system
    /// prompt so that models without function calling still answer in shape.
    pub fn reply_instructions(&self) -> String {
        let [cont, middle, last] = self.actions();
        let feedback = match self {
            InterviewKind::Behavioral => "'user_response' ('strength', 'improvement')",
            InterviewKind::Technical => "'user_solution' ('logic')",
        };
        format!(
            "Return valid JSON with keys 'action' ('{cont}', '{middle}', '{last}'), 'thinking' (1 sentence), 'message' (1-2 sentences, <100 chars), {feedback}. Ensure complete JSON with no trailing commas."
        )
    }
}

impl fmt::Display for InterviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interview kind '{0}', expected 'behavioral' or 'technical'")]
pub struct UnknownInterviewKind(pub String);

impl FromStr for InterviewKind {
    type Err = UnknownInterviewKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "behavioral" | "behavioural" => Ok(InterviewKind::Behavioral),
            "technical" => Ok(InterviewKind::Technical),
            _ => Err(UnknownInterviewKind(s.to_string())),
        }
    }
}

/// A static set of interview questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<String>,
}

impl QuestionBank {
    pub fn new(questions: Vec<String>) -> Self {
        let questions = questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        Self { questions }
    }

    /// One question per paragraph; paragraphs are separated by blank lines.
    pub fn from_paragraphs(text: &str) -> Self {
        Self::new(BLANK_LINES.split(text).map(str::to_string).collect())
    }

    /// The whole text is a single question.
    pub fn single(text: &str) -> Self {
        Self::new(vec![text.to_string()])
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Draws a question uniformly at random.
    pub fn pick(&self) -> String {
        self.questions
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_QUESTION.to_string())
    }
}

// --- Reply argument schemas ---

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum BehavioralAction {
    FollowUp,
    Reflection,
    Complete,
}

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TechnicalAction {
    FollowUp,
    Guidance,
    Ready,
}

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
struct BehavioralFeedback {
    #[schemars(description = "The strongest aspect of the user's response")]
    strength: String,
    #[schemars(description = "One specific area where the user could improve")]
    improvement: String,
}

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
struct TechnicalFeedback {
    #[schemars(description = "A short assessment of the logic of the user's approach")]
    logic: String,
}

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
struct BehavioralReplyArgs {
    #[schemars(description = "The type of response to give")]
    action: BehavioralAction,
    #[schemars(description = "Internal thinking (1 sentence)")]
    thinking: Option<String>,
    #[schemars(description = "Response to the candidate (1-2 sentences, <100 chars)")]
    message: String,
    user_response: BehavioralFeedback,
}

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
struct TechnicalReplyArgs {
    #[schemars(description = "The type of response to give")]
    action: TechnicalAction,
    #[schemars(description = "Internal thinking (1 sentence)")]
    thinking: Option<String>,
    #[schemars(description = "Response to the candidate (1-2 sentences, <100 chars)")]
    message: String,
    user_solution: TechnicalFeedback,
}

/// Draft-07 schema of `T` with subschemas inlined, as function-call
/// parameters expect.
pub(crate) fn inline_schema<T: JsonSchema>() -> Value {
    let mut generator = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let mut value = serde_json::to_value(generator.root_schema_for::<T>()).unwrap_or_default();
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}
