//! Core of the interview coach: session transcripts, prompt assembly, model
//! reply interpretation, the turn-taking state machine, the speech bridges and
//! the end-of-interview summary.
//!
//! Nothing in this crate knows about HTTP. Every outbound dependency (the
//! language model, the speech services, the transcript storage) sits behind a
//! trait so the api service can wire real backends and tests can wire mocks.

pub mod code_review;
pub mod error;
pub mod interpreter;
pub mod interview;
pub mod llm_client;
pub mod prompt;
pub mod repair;
pub mod reply;
pub mod speech;
pub mod summary;
pub mod transcript;
pub mod transcription;
pub mod turn;
