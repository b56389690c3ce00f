//! Axum Handlers for the REST API
//!
//! Interview sessions, turns, code review, summaries and the speech endpoints. Each
//! handler carries a `utoipa` path annotation for the OpenAPI document.

use axum::{
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use bullaio_core::{
    code_review::{CodeSubmission, render_report},
    error::TranscriptionError,
    interview::{InterviewKind, UnknownInterviewKind},
    speech::AUDIO_MIME,
    transcript::{Sender, SessionKey, TranscriptStore},
    transcription::AudioUpload,
    turn::{TurnError, Utterance},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        AnalysisResponse, AnalyzeCodePayload, CodeRecordResponse, CreateSessionResponse,
        ErrorResponse, SaveCodePayload, SpeechPayload, SummaryResponse, TranscriptEntry,
        TranscriptionResponse, TranscriptionUpload, TurnPayload, TurnResponse,
    },
    prompts::InterviewCatalog,
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// An outbound service failed. The message is shown to the client.
    Upstream(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Upstream(message) => (StatusCode::BAD_GATEWAY, message),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl ApiError {
    fn from_turn(err: TurnError) -> Self {
        match err {
            TurnError::SessionComplete => {
                ApiError::Conflict("The interview is already complete".to_string())
            }
            TurnError::Busy => ApiError::Conflict("A turn is already in progress".to_string()),
            TurnError::EmptyUtterance => ApiError::BadRequest("No prompt provided".to_string()),
            TurnError::Model(e) => {
                error!(error = %e, "Model call failed");
                ApiError::Upstream("Failed to generate a reply".to_string())
            }
            TurnError::Persistence(e) => ApiError::InternalServerError(e.into()),
        }
    }
}

fn parse_kind(kind: &str) -> Result<InterviewKind, ApiError> {
    kind.parse()
        .map_err(|e: UnknownInterviewKind| ApiError::BadRequest(e.to_string()))
}

fn catalog(state: &AppState, kind: InterviewKind) -> Result<&InterviewCatalog, ApiError> {
    state.interviews.get(&kind).ok_or_else(|| {
        ApiError::InternalServerError(anyhow::anyhow!("no prompts configured for {kind}"))
    })
}

/// Resolves a session path and checks that the session exists.
async fn existing_session(state: &AppState, kind: &str, id: Uuid) -> Result<SessionKey, ApiError> {
    let key = SessionKey::new(parse_kind(kind)?, id);
    if !state.store.exists(&key).await {
        return Err(ApiError::NotFound(format!("Session '{id}' not found")));
    }
    Ok(key)
}

/// Start a new interview session with a freshly drawn question.
#[utoipa::path(
    post,
    path = "/interviews/{kind}/sessions",
    responses(
        (status = 201, description = "Session created successfully", body = CreateSessionResponse),
        (status = 400, description = "Unknown interview kind", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind: behavioral or technical")
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let question = catalog(&state, kind)?.bank.pick();
    let key = SessionKey::generate(kind);

    state
        .turns
        .start_session(&key, &question)
        .await
        .map_err(ApiError::from_turn)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: key.id,
            kind,
            question,
        }),
    ))
}

/// Get the full transcript of a session.
#[utoipa::path(
    get,
    path = "/interviews/{kind}/sessions/{id}/transcript",
    responses(
        (status = 200, description = "Transcript in conversation order", body = [TranscriptEntry]),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind"),
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<TranscriptEntry>>, ApiError> {
    let key = existing_session(&state, &kind, id).await?;
    let transcript = state.store.load_all(&key).await;
    Ok(Json(transcript.into_iter().map(TranscriptEntry::from).collect()))
}

/// Delete a session with its transcript and code submission.
#[utoipa::path(
    delete,
    path = "/interviews/{kind}/sessions/{id}",
    responses(
        (status = 204, description = "Session deleted"),
        (status = 400, description = "Unknown interview kind", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind"),
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let key = SessionKey::new(parse_kind(&kind)?, id);
    state.store.delete(&key).await?;
    info!(session = %key, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Submit the candidate's answer and get the interviewer's reply.
#[utoipa::path(
    post,
    path = "/interviews/{kind}/sessions/{id}/turns",
    request_body = TurnPayload,
    responses(
        (status = 200, description = "Interviewer reply", body = TurnResponse),
        (status = 400, description = "Empty prompt or unknown kind", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Interview already complete or a turn is in progress", body = ErrorResponse),
        (status = 502, description = "Language model failed", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind"),
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn take_turn(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(payload): Json<TurnPayload>,
) -> Result<Json<TurnResponse>, ApiError> {
    let key = existing_session(&state, &kind, id).await?;
    if payload.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("No prompt provided".to_string()));
    }
    let prompts = catalog(&state, key.kind)?;
    let utterance = match payload.audio {
        Some(audio) => Utterance::spoken(payload.prompt, audio),
        None => Utterance::typed(payload.prompt),
    };

    let outcome = state
        .turns
        .take_turn(&key, &prompts.template, &prompts.bank, utterance)
        .await
        .map_err(ApiError::from_turn)?;

    // The turn is already recorded, so a speech failure only drops the audio.
    let audio = if payload.speak.unwrap_or(true) {
        match state.speech.synthesize(&outcome.reply.message).await {
            Ok(audio) => Some(STANDARD.encode(&audio)),
            Err(e) => {
                warn!(error = %e, session = %key, "Failed to generate speech for reply");
                None
            }
        }
    } else {
        None
    };

    let reply = outcome.reply;
    Ok(Json(TurnResponse {
        action: reply.action,
        state: outcome.state,
        next_state: outcome.next_state,
        message: reply.message,
        thinking: reply.thinking,
        feedback: reply.feedback,
        audio_mime: audio.as_ref().map(|_| AUDIO_MIME.to_string()),
        audio_base64: audio,
    }))
}

/// Save the candidate's code for a session.
#[utoipa::path(
    put,
    path = "/interviews/{kind}/sessions/{id}/code",
    request_body = SaveCodePayload,
    responses(
        (status = 200, description = "Code saved", body = CodeRecordResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind"),
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn save_code(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(payload): Json<SaveCodePayload>,
) -> Result<Json<CodeRecordResponse>, ApiError> {
    let key = existing_session(&state, &kind, id).await?;
    let submission = CodeSubmission::new(payload.code);
    state.store.save_code(&key, &submission).await?;
    info!(session = %key, chars = submission.code.len(), "Code saved");
    Ok(Json(CodeRecordResponse::new(id, submission)))
}

/// Analyze the session's code and render a markdown report.
#[utoipa::path(
    post,
    path = "/interviews/{kind}/sessions/{id}/code/analysis",
    request_body = AnalyzeCodePayload,
    responses(
        (status = 200, description = "Code review", body = AnalysisResponse),
        (status = 400, description = "No code provided", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Language model failed", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind"),
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn analyze_code(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(payload): Json<AnalyzeCodePayload>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let key = existing_session(&state, &kind, id).await?;
    let code = match payload.code.filter(|c| !c.trim().is_empty()) {
        Some(code) => code,
        None => state
            .store
            .load_code(&key)
            .await
            .map(|saved| saved.code)
            .ok_or_else(|| ApiError::BadRequest("No code provided".to_string()))?,
    };

    let analysis = state.code_analyzer.analyze(&code).await.map_err(|e| {
        error!(error = %e, "Code analysis failed");
        ApiError::Upstream("Failed to analyze code".to_string())
    })?;

    let template = payload
        .template
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| state.report_template.to_string());
    let date = Utc::now().format("%Y-%m-%d").to_string();
    let report = render_report(&template, &analysis, &date);

    let submission = CodeSubmission::new(code).with_review(analysis.clone(), report.clone());
    state.store.save_code(&key, &submission).await?;

    Ok(Json(AnalysisResponse { report, analysis }))
}

/// Write the end-of-interview feedback summary of a session.
#[utoipa::path(
    post,
    path = "/interviews/{kind}/sessions/{id}/summary",
    responses(
        (status = 200, description = "Feedback summary", body = SummaryResponse),
        (status = 400, description = "No answers to summarize", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Language model failed", body = ErrorResponse)
    ),
    params(
        ("kind" = String, Path, description = "Interview kind"),
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn summarize_session(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let key = existing_session(&state, &kind, id).await?;
    let transcript = state.store.load_all(&key).await;
    if !transcript.iter().any(|msg| msg.from == Sender::User) {
        return Err(ApiError::BadRequest(
            "The interview has no answers to summarize".to_string(),
        ));
    }
    let code = match key.kind {
        InterviewKind::Technical => state.store.load_code(&key).await,
        InterviewKind::Behavioral => None,
    };

    let summary = state
        .summarizer
        .summarize(&catalog(&state, key.kind)?.summary, &transcript, code.as_ref())
        .await
        .map_err(|e| {
            error!(error = %e, session = %key, "Summary generation failed");
            ApiError::Upstream("Failed to generate summary".to_string())
        })?;

    Ok(Json(SummaryResponse {
        kind: key.kind,
        summary,
    }))
}

/// Convert text to speech.
#[utoipa::path(
    post,
    path = "/speech",
    request_body = SpeechPayload,
    responses(
        (status = 200, description = "MPEG audio (audio/mpeg) of the spoken text"),
        (status = 502, description = "Speech service failed", body = ErrorResponse)
    )
)]
pub async fn synthesize_speech(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpeechPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = state.speech.synthesize(&payload.text).await.map_err(|e| {
        error!(error = %e, "Speech synthesis failed");
        ApiError::Upstream("Failed to generate speech".to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, AUDIO_MIME)], audio))
}

/// Transcribe a recorded answer.
#[utoipa::path(
    post,
    path = "/transcriptions",
    request_body(content = TranscriptionUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Transcription", body = TranscriptionResponse),
        (status = 400, description = "No audio provided", body = ErrorResponse),
        (status = 502, description = "Speech service failed", body = ErrorResponse)
    )
)]
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if !matches!(field.name(), Some("audio") | Some("file")) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("audio.webm").to_string();
        let mime_type = field.content_type().unwrap_or("audio/webm").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some(AudioUpload::new(bytes, file_name, mime_type));
        break;
    }
    let upload = upload.ok_or_else(|| ApiError::BadRequest("No audio file provided".to_string()))?;
    let audio = upload.metadata();
    info!(
        file = %upload.file_name,
        mime = %upload.mime_type,
        bytes = upload.bytes.len(),
        "Received audio for transcription"
    );

    let transcription = state
        .transcriber
        .transcribe(upload)
        .await
        .map_err(|e| match e {
            TranscriptionError::EmptyAudio => ApiError::BadRequest(e.to_string()),
            e => {
                error!(error = %e, "Transcription failed");
                ApiError::Upstream("Failed to transcribe audio".to_string())
            }
        })?;

    Ok(Json(TranscriptionResponse::new(transcription, audio)))
}
