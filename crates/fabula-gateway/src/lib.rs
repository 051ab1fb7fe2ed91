//! Fabula Gateway — pluggable generation backends.
//!
//! Two [`ModelGateway`](fabula_core::gateway::ModelGateway) implementations:
//! an OpenAI-compatible HTTP backend for real deployments and a deterministic
//! offline backend for development without credentials. Backend selection is
//! environment-driven and resolved once at startup.

use std::sync::Arc;

use fabula_core::error::DomainError;
use fabula_core::gateway::ModelGateway;
use fabula_core::media::MediaStore;

mod offline;
mod openai;
mod prompts;

pub use offline::OfflineGateway;
pub use openai::OpenAiGateway;

/// Which backend family to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OpenAI-compatible HTTP API.
    OpenAi,
    /// Deterministic local backend, no network or credentials.
    Offline,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "openai" => Ok(Self::OpenAi),
            "offline" => Ok(Self::Offline),
            other => Err(DomainError::Validation(format!(
                "unknown model backend {other:?}, expected \"openai\" or \"offline\""
            ))),
        }
    }
}

/// Gateway configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Selected backend family.
    pub backend: BackendKind,
    /// API key for the HTTP backend.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// Model for story generation, review, and grading.
    pub chat_model: String,
    /// Model for scene image rendering.
    pub image_model: String,
    /// Model for speech synthesis.
    pub speech_model: String,
    /// Model for transcription.
    pub transcription_model: String,
}

impl GatewayConfig {
    /// Reads the configuration from `MODEL_BACKEND`, `OPENAI_API_KEY`,
    /// `OPENAI_API_BASE`, and the `*_MODEL` overrides. The backend defaults
    /// to `offline` so a bare checkout runs without credentials.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for an unknown backend name or a
    /// missing API key when the `openai` backend is selected.
    pub fn from_env() -> Result<Self, DomainError> {
        let backend = match std::env::var("MODEL_BACKEND") {
            Ok(value) => BackendKind::parse(&value)?,
            Err(_) => BackendKind::Offline,
        };
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if backend == BackendKind::OpenAi && api_key.is_empty() {
            return Err(DomainError::Validation(
                "OPENAI_API_KEY must be set for the openai backend".to_owned(),
            ));
        }
        Ok(Self {
            backend,
            api_key,
            api_base: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_owned()),
            chat_model: std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_owned()),
            image_model: std::env::var("IMAGE_MODEL")
                .unwrap_or_else(|_| "gpt-image-1".to_owned()),
            speech_model: std::env::var("SPEECH_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini-tts".to_owned()),
            transcription_model: std::env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_owned()),
        })
    }

    /// Instantiates the configured backend. Rendered artifacts are written
    /// through `media`.
    #[must_use]
    pub fn build(self, media: Arc<dyn MediaStore>) -> Arc<dyn ModelGateway> {
        match self.backend {
            BackendKind::OpenAi => Arc::new(OpenAiGateway::new(self, media)),
            BackendKind::Offline => Arc::new(OfflineGateway::new(media)),
        }
    }
}
