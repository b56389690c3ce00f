//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AnalysisResponse, AnalyzeCodePayload, CodeRecordResponse, CreateSessionResponse,
        ErrorResponse, SaveCodePayload, SpeechPayload, SummaryResponse, TranscriptEntry,
        TranscriptionResponse, TranscriptionUpload, TurnPayload, TurnResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::get_transcript,
        handlers::delete_session,
        handlers::take_turn,
        handlers::save_code,
        handlers::analyze_code,
        handlers::summarize_session,
        handlers::synthesize_speech,
        handlers::transcribe,
    ),
    components(
        schemas(
            CreateSessionResponse, TranscriptEntry, TurnPayload, TurnResponse,
            SaveCodePayload, CodeRecordResponse, AnalyzeCodePayload, AnalysisResponse,
            SummaryResponse, SpeechPayload, TranscriptionUpload, TranscriptionResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Bull.aio API", description = "Voice-driven behavioral and technical interview practice")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/interviews/{kind}/sessions",
            post(handlers::create_session),
        )
        .route(
            "/interviews/{kind}/sessions/{id}",
            delete(handlers::delete_session),
        )
        .route(
            "/interviews/{kind}/sessions/{id}/transcript",
            get(handlers::get_transcript),
        )
        .route(
            "/interviews/{kind}/sessions/{id}/turns",
            post(handlers::take_turn),
        )
        .route(
            "/interviews/{kind}/sessions/{id}/code",
            put(handlers::save_code),
        )
        .route(
            "/interviews/{kind}/sessions/{id}/code/analysis",
            post(handlers::analyze_code),
        )
        .route(
            "/interviews/{kind}/sessions/{id}/summary",
            post(handlers::summarize_session),
        )
        .route("/speech", post(handlers::synthesize_speech))
        .route("/transcriptions", post(handlers::transcribe))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/interviews/{kind}/sessions",
            "/interviews/{kind}/sessions/{id}",
            "/interviews/{kind}/sessions/{id}/transcript",
            "/interviews/{kind}/sessions/{id}/turns",
            "/interviews/{kind}/sessions/{id}/code",
            "/interviews/{kind}/sessions/{id}/code/analysis",
            "/interviews/{kind}/sessions/{id}/summary",
            "/speech",
            "/transcriptions",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
