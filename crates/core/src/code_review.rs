//! Code Analyzer
//!
//! Asks the model for a structured review of a technical-interview solution
//! and renders it into a markdown report.

use crate::{
    error::ModelCallError,
    interview::inline_schema,
    llm_client::{CompletionRequest, LlmClient, ReplyFunction},
    prompt::substitute,
    repair::repair,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc};
use tracing::{info, instrument, warn};

pub const CODE_PLACEHOLDER: &str = "{user_code}";
pub const ANALYSIS_FUNCTION_NAME: &str = "provide_code_analysis";

/// Used when no analysis template is configured.
pub const FALLBACK_ANALYSIS_PROMPT: &str = "You are a code analysis expert. Analyze the following code and provide constructive feedback:

{user_code}

Evaluate the code quality, suggest improvements, and identify potential optimizations.";

pub const DEFAULT_REPORT_TEMPLATE: &str = "# Code Analysis Report

## Quality Assessment
{{quality}}

## Overall Summary
{{message}}

## Logic Analysis
{{logic}}

## Suggested Improvements
{{suggestions}}

## Optimization Opportunities
{{optimizations}}

*Analysis generated on {{date}}*";

const ANALYSIS_INSTRUCTIONS: &str = "Return valid JSON with keys 'quality' ('LOW', 'AVERAGE', 'HIGH'), 'message' (summary), 'analysis' (with 'logic', 'suggestions' array, 'optimizations' array), and 'thinking' (optional). Ensure complete JSON with no trailing commas.";

const ANALYSIS_REQUEST: &str = "Analyze this code and provide detailed feedback.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    #[serde(alias = "low", alias = "Low")]
    Low,
    #[default]
    #[serde(alias = "average", alias = "Average")]
    Average,
    #[serde(alias = "high", alias = "High")]
    High,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Low => "LOW",
            Quality::Average => "AVERAGE",
            Quality::High => "HIGH",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisDetail {
    /// Assessment of the solution's logic.
    pub logic: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub optimizations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CodeAnalysis {
    pub quality: Quality,
    /// Summary of the review.
    pub message: String,
    pub analysis: AnalysisDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl Default for CodeAnalysis {
    fn default() -> Self {
        Self {
            quality: Quality::Average,
            message: "Unable to generate a complete analysis".to_string(),
            analysis: AnalysisDetail {
                logic: "No logic assessment available".to_string(),
                suggestions: vec!["No suggestions available".to_string()],
                optimizations: vec!["No optimizations available".to_string()],
            },
            thinking: None,
        }
    }
}

impl CodeAnalysis {
    /// Parses raw model output, falling back to the default analysis.
    pub fn parse_or_default(raw: &str) -> Self {
        let object = match repair(raw) {
            Ok(object) => object,
            Err(e) => {
                warn!(error = %e, "Code analysis is not JSON, using default analysis");
                return Self::default();
            }
        };
        serde_json::from_value(Value::Object(object)).unwrap_or_else(|e| {
            warn!(error = %e, "Code analysis has an unexpected shape, using default analysis");
            Self::default()
        })
    }
}

/// A code submission stored with a session, along with its last review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSubmission {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<CodeAnalysis>,
    pub updated_at: DateTime<Utc>,
}

impl CodeSubmission {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            report: None,
            analysis: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_review(mut self, analysis: CodeAnalysis, report: String) -> Self {
        self.analysis = Some(analysis);
        self.report = Some(report);
        self.updated_at = Utc::now();
        self
    }
}

pub struct CodeAnalyzer {
    llm: Arc<dyn LlmClient>,
    prompt_template: String,
}

impl CodeAnalyzer {
    /// `prompt_template` must contain `{user_code}`; `None` uses the built-in
    /// prompt.
    pub fn new(llm: Arc<dyn LlmClient>, prompt_template: Option<String>) -> Self {
        let prompt_template = prompt_template
            .filter(|t| t.contains(CODE_PLACEHOLDER))
            .unwrap_or_else(|| FALLBACK_ANALYSIS_PROMPT.to_string());
        Self {
            llm,
            prompt_template,
        }
    }

    #[instrument(skip_all, fields(code_chars = code.len()))]
    pub async fn analyze(&self, code: &str) -> Result<CodeAnalysis, ModelCallError> {
        let system_prompt = format!(
            "{}\n{ANALYSIS_INSTRUCTIONS}",
            self.prompt_template.replacen(CODE_PLACEHOLDER, code, 1)
        );
        let request = CompletionRequest::new(system_prompt, ANALYSIS_REQUEST)
            .with_function(ReplyFunction {
                name: ANALYSIS_FUNCTION_NAME.to_string(),
                description: "Provide a structured review of the submitted code".to_string(),
                parameters: inline_schema::<CodeAnalysis>(),
            })
            .with_max_tokens(None);

        let raw = self.llm.complete(request).await?;
        let analysis = CodeAnalysis::parse_or_default(&raw);
        info!(quality = %analysis.quality, "Code analysis completed");
        Ok(analysis)
    }
}

/// Fills every `{{key}}` in `template` from `analysis`. List fields become
/// `- item` lines.
pub fn render_report(template: &str, analysis: &CodeAnalysis, date: &str) -> String {
    let bullets = |items: &[String]| {
        items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let values = [
        ("quality", analysis.quality.to_string()),
        ("message", analysis.message.clone()),
        ("logic", analysis.analysis.logic.clone()),
        (
            "thinking",
            analysis
                .thinking
                .clone()
                .unwrap_or_else(|| "No additional insights provided".to_string()),
        ),
        ("date", date.to_string()),
        ("suggestions", bullets(&analysis.analysis.suggestions)),
        ("optimizations", bullets(&analysis.analysis.optimizations)),
    ];

    substitute(template, ("{{", "}}"), |name| {
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLlmClient;

    const GOOD: &str = r#"{
        "quality": "HIGH",
        "message": "Clean single-pass solution.",
        "analysis": {
            "logic": "Uses a hash map of complements.",
            "suggestions": ["Name the map", "Handle empty input"],
            "optimizations": []
        },
        "thinking": "Linear time."
    }"#;

    #[test]
    fn test_parse_well_formed_analysis() {
        let analysis = CodeAnalysis::parse_or_default(GOOD);
        assert_eq!(analysis.quality, Quality::High);
        assert_eq!(analysis.analysis.suggestions.len(), 2);
        assert_eq!(analysis.thinking.as_deref(), Some("Linear time."));
    }

    #[test]
    fn test_parse_repairs_trailing_commas() {
        let raw = r#"{"quality": "low", "message": "Buggy.", "analysis": {"logic": "Off by one.", "suggestions": ["Check bounds",],},}"#;
        let analysis = CodeAnalysis::parse_or_default(raw);
        assert_eq!(analysis.quality, Quality::Low);
        assert_eq!(analysis.analysis.suggestions, vec!["Check bounds".to_string()]);
        assert!(analysis.analysis.optimizations.is_empty());
    }

    #[test]
    fn test_parse_falls_back_to_default() {
        assert_eq!(CodeAnalysis::parse_or_default("no json"), CodeAnalysis::default());
        assert_eq!(
            CodeAnalysis::parse_or_default(r#"{"quality": "EXCELLENT", "message": "x"}"#),
            CodeAnalysis::default()
        );
    }

    #[test]
    fn test_render_report_fills_all_keys() {
        let analysis = CodeAnalysis::parse_or_default(GOOD);
        let report = render_report(DEFAULT_REPORT_TEMPLATE, &analysis, "2026-10-19");
        assert!(report.contains("## Quality Assessment\nHIGH\n"));
        assert!(report.contains("- Name the map\n- Handle empty input"));
        assert!(report.contains("*Analysis generated on 2026-10-19*"));
        assert!(!report.contains("{{"));
    }

    #[test]
    fn test_render_report_repeats_and_defaults() {
        let analysis = CodeAnalysis::default();
        let report = render_report("{{quality}}/{{quality}} {{thinking}} {{unknown}}", &analysis, "d");
        assert_eq!(report, "AVERAGE/AVERAGE No additional insights provided {{unknown}}");
    }

    #[test]
    fn test_render_report_keeps_placeholders_in_model_text() {
        let analysis = CodeAnalysis {
            message: "Use {{date}} carefully".to_string(),
            ..CodeAnalysis::default()
        };
        let report = render_report("{{message}} ({{date}})", &analysis, "2026-10-19");
        assert_eq!(report, "Use {{date}} carefully (2026-10-19)");
    }

    #[test]
    fn test_analyzer_uses_fallback_prompt_without_placeholder() {
        let analyzer = CodeAnalyzer::new(Arc::new(MockLlmClient::new()), Some("no slot".to_string()));
        assert_eq!(analyzer.prompt_template, FALLBACK_ANALYSIS_PROMPT);
    }

    #[tokio::test]
    async fn test_analyze_embeds_code_and_parses_reply() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .withf(|request| {
                request.system_prompt.contains("fn two_sum()")
                    && request.system_prompt.contains("'optimizations' array")
                    && request
                        .function
                        .as_ref()
                        .is_some_and(|f| f.name == ANALYSIS_FUNCTION_NAME)
                    && request.max_tokens.is_none()
            })
            .times(1)
            .returning(|_| Ok(GOOD.to_string()));
        let analyzer = CodeAnalyzer::new(Arc::new(llm), None);

        let analysis = analyzer.analyze("fn two_sum() {}").await.unwrap();
        assert_eq!(analysis.quality, Quality::High);
    }

    #[tokio::test]
    async fn test_analyze_propagates_upstream_failure() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Err(ModelCallError::EmptyResponse));
        let analyzer = CodeAnalyzer::new(Arc::new(llm), None);
        assert!(analyzer.analyze("x").await.is_err());
    }
}
