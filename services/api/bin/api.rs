//! Main Entrypoint for the Bull.aio API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading prompt templates and question banks.
//! 3. Initializing shared services (the LLM client and the ElevenLabs bridges).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use bullaio_api::{
    config::Config,
    prompts::{CODE_ANALYSIS_TEMPLATE, CODE_REPORT_TEMPLATE, load_prompts},
    router::create_router,
    state::{AppState, Backends},
    store::FileStore,
};
use bullaio_core::{
    code_review::DEFAULT_REPORT_TEMPLATE,
    llm_client::{LlmClient, OpenAICompatibleClient},
    speech::{ElevenLabsTts, VoiceConfig, VoiceSettings},
    transcription::ElevenLabsStt,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Prompts ---
    let library = load_prompts(&config.prompts_path)?;
    let interviews = library.interview_catalog()?;
    let analysis_prompt = library.template(CODE_ANALYSIS_TEMPLATE);
    if analysis_prompt.is_none() {
        warn!("{CODE_ANALYSIS_TEMPLATE}.md not found, using the built-in analysis prompt");
    }
    let report_template = library
        .template(CODE_REPORT_TEMPLATE)
        .unwrap_or_else(|| DEFAULT_REPORT_TEMPLATE.to_string());

    // --- 4. Initialize Shared Services ---
    let api_key = config
        .provider_api_key()
        .context("No API key configured for the LLM provider")?;
    info!(provider = ?config.provider, "Using chat completion provider.");
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider.api_base());
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let backends = Backends {
        llm,
        tts: Box::new(ElevenLabsTts::new(config.elevenlabs_api_key.clone())),
        voice: VoiceConfig {
            voice_id: config.voice_id.clone(),
            model_id: config.tts_model.clone(),
            settings: VoiceSettings::default(),
        },
        transcriber: Arc::new(
            ElevenLabsStt::new(config.elevenlabs_api_key.clone())
                .with_model(config.stt_model.clone(), config.stt_language.clone()),
        ),
    };

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;
    let store = Arc::new(FileStore::new(config.data_dir.clone()));

    let app_state = Arc::new(AppState::new(
        store,
        backends,
        interviews,
        analysis_prompt,
        report_template,
    ));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        data_dir = %config.data_dir.display(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
