//! Prompt templates and question banks loaded from the prompts directory.
//!
//! `*.md` files are templates keyed by file stem, `*.txt` files are question
//! banks keyed by file name.

use anyhow::Context;
use bullaio_core::{
    interview::{InterviewKind, QuestionBank},
    prompt::PromptTemplate,
    summary::default_summary_template,
};
use std::{collections::HashMap, fs, path::Path};
use tracing::{info, warn};

/// Template stem of the code analysis prompt.
pub const CODE_ANALYSIS_TEMPLATE: &str = "code_analysis";

/// Template stem of the markdown code review report.
pub const CODE_REPORT_TEMPLATE: &str = "code_report";

#[derive(Debug, Default, Clone)]
pub struct PromptLibrary {
    pub templates: HashMap<String, String>,
    pub banks: HashMap<String, String>,
}

/// Everything one interview kind needs at runtime.
#[derive(Debug, Clone)]
pub struct InterviewCatalog {
    pub template: PromptTemplate,
    pub bank: QuestionBank,
    /// Template of the end-of-interview summary.
    pub summary: String,
}

/// A helper function to load prompts from a directory.
pub fn load_prompts(prompts_path: &Path) -> anyhow::Result<PromptLibrary> {
    let mut library = PromptLibrary::default();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|s| s.to_str()) {
            Some("md") => {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .context("Could not get file stem")?
                    .to_string();
                library.templates.insert(key, fs::read_to_string(&path)?);
            }
            Some("txt") => {
                let key = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .context("Could not get file name")?
                    .to_string();
                library.banks.insert(key, fs::read_to_string(&path)?);
            }
            _ => {}
        }
    }
    Ok(library)
}

impl PromptLibrary {
    /// Builds the per-kind catalog. Every kind needs its template; a missing
    /// question bank leaves the kind asking the default question.
    pub fn interview_catalog(&self) -> anyhow::Result<HashMap<InterviewKind, InterviewCatalog>> {
        let mut catalog = HashMap::new();
        for kind in InterviewKind::ALL {
            let text = self
                .templates
                .get(kind.template_name())
                .with_context(|| format!("{}.md not found in prompts directory", kind.template_name()))?;
            let template = PromptTemplate::new(text.clone());
            let missing = template.missing_placeholders();
            if !missing.is_empty() {
                warn!(%kind, ?missing, "Prompt template does not use every placeholder");
            }

            let bank = match self.banks.get(kind.question_file()) {
                Some(text) => kind.question_bank(text),
                None => {
                    warn!(%kind, file = kind.question_file(), "Question bank not found");
                    QuestionBank::default()
                }
            };

            let summary = self.template(kind.summary_template_name()).unwrap_or_else(|| {
                warn!(%kind, "Summary template not found, using the built-in one");
                default_summary_template(kind).to_string()
            });
            info!(%kind, questions = bank.len(), "Interview prompts loaded");
            catalog.insert(
                kind,
                InterviewCatalog {
                    template,
                    bank,
                    summary,
                },
            );
        }
        Ok(catalog)
    }

    pub fn template(&self, name: &str) -> Option<String> {
        self.templates.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_load_prompts_splits_templates_and_banks() {
        let dir = TempDir::new().unwrap();
        write(&dir, "behavioral.md", "B {chat_history} {current_question} {user_prompt}");
        write(&dir, "technical.md", "T {chat_history} {current_question} {user_prompt}");
        write(&dir, "behavioral_questions.txt", "One?\n\nTwo?");
        write(&dir, "behavioral_summary.md", "Summarize {chat_history}");
        write(&dir, "notes.json", "{}");
        fs::create_dir(dir.path().join("nested.md")).unwrap();

        let library = load_prompts(dir.path()).unwrap();
        assert_eq!(library.templates.len(), 3);
        assert!(library.template("behavioral").unwrap().starts_with("B "));
        assert_eq!(library.banks.len(), 1);

        let catalog = library.interview_catalog().unwrap();
        assert_eq!(catalog[&InterviewKind::Behavioral].bank.len(), 2);
        assert!(catalog[&InterviewKind::Technical].bank.is_empty());
        assert_eq!(catalog[&InterviewKind::Behavioral].summary, "Summarize {chat_history}");
        assert_eq!(
            catalog[&InterviewKind::Technical].summary,
            default_summary_template(InterviewKind::Technical)
        );
    }

    #[test]
    fn test_catalog_requires_every_template() {
        let dir = TempDir::new().unwrap();
        write(&dir, "behavioral.md", "{user_prompt}");

        let err = load_prompts(dir.path())
            .unwrap()
            .interview_catalog()
            .unwrap_err();
        assert!(err.to_string().contains("technical.md"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_prompts(&dir.path().join("absent")).is_err());
    }
}
