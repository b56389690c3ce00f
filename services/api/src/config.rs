use bullaio_core::{
    speech::{DEFAULT_TTS_MODEL, DEFAULT_VOICE_ID},
    transcription::{DEFAULT_STT_LANGUAGE, DEFAULT_STT_MODEL},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The OpenAI-compatible chat completion backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub data_dir: PathBuf,
    pub prompts_path: PathBuf,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub elevenlabs_api_key: String,
    pub voice_id: String,
    pub tts_model: String,
    pub stt_model: String,
    pub stt_language: String,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let data_dir = PathBuf::from(var_or("DATA_DIR", "./data"));
        let prompts_path = PathBuf::from(var_or("PROMPTS_PATH", "./prompts"));

        let provider_str = var_or("LLM_PROVIDER", "openai");
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{other}' is not one of 'openai', 'gemini'"),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        match provider {
            Provider::OpenAI if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                ));
            }
            Provider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                ));
            }
            _ => {}
        }

        let chat_model = var_or("CHAT_MODEL", "gpt-3.5-turbo-0125");

        let elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| ConfigError::MissingVar("ELEVENLABS_API_KEY".to_string()))?;
        let voice_id = var_or("ELEVENLABS_VOICE_ID", DEFAULT_VOICE_ID);
        let tts_model = var_or("TTS_MODEL", DEFAULT_TTS_MODEL);
        let stt_model = var_or("STT_MODEL", DEFAULT_STT_MODEL);
        let stt_language = var_or("STT_LANGUAGE", DEFAULT_STT_LANGUAGE);

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            data_dir,
            prompts_path,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            elevenlabs_api_key,
            voice_id,
            tts_model,
            stt_model,
            stt_language,
            log_level,
        })
    }

    /// The API key of the configured provider.
    pub fn provider_api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}
