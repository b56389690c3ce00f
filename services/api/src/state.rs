//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the file store and
//! the core services every handler shares.

use crate::{prompts::InterviewCatalog, store::FileStore};
use bullaio_core::{
    code_review::CodeAnalyzer,
    interpreter::ResponseInterpreter,
    interview::InterviewKind,
    llm_client::LlmClient,
    speech::{SpeechBridge, TtsBackend, VoiceConfig},
    summary::InterviewSummarizer,
    transcription::Transcriber,
    turn::TurnController,
};
use std::{collections::HashMap, sync::Arc};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub turns: Arc<TurnController>,
    pub speech: Arc<SpeechBridge>,
    pub transcriber: Arc<dyn Transcriber>,
    pub code_analyzer: Arc<CodeAnalyzer>,
    pub summarizer: Arc<InterviewSummarizer>,
    pub interviews: Arc<HashMap<InterviewKind, InterviewCatalog>>,
    pub report_template: Arc<String>,
}

/// The outbound services the state is wired from.
pub struct Backends {
    pub llm: Arc<dyn LlmClient>,
    pub tts: Box<dyn TtsBackend>,
    pub voice: VoiceConfig,
    pub transcriber: Arc<dyn Transcriber>,
}

impl AppState {
    pub fn new(
        store: Arc<FileStore>,
        backends: Backends,
        interviews: HashMap<InterviewKind, InterviewCatalog>,
        analysis_prompt: Option<String>,
        report_template: String,
    ) -> Self {
        let turns = TurnController::new(
            store.clone(),
            ResponseInterpreter::new(backends.llm.clone()),
        );
        Self {
            store,
            turns: Arc::new(turns),
            speech: Arc::new(SpeechBridge::new(backends.tts, backends.voice)),
            transcriber: backends.transcriber,
            code_analyzer: Arc::new(CodeAnalyzer::new(backends.llm.clone(), analysis_prompt)),
            summarizer: Arc::new(InterviewSummarizer::new(backends.llm)),
            interviews: Arc::new(interviews),
            report_template: Arc::new(report_template),
        }
    }
}
