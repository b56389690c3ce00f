//! Bull.aio API Library Crate
//!
//! This library contains the web service around the interview core: the
//! application state, file-backed persistence, prompt loading, API handlers
//! and routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod router;
pub mod state;
pub mod store;
