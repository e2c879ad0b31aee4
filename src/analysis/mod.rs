// =============================================================================
// Analysis Client — text-generation backends behind one capability
// =============================================================================
//
// `AnalysisClient::generate(prompt, question, max_tokens)` is the only thing
// the rest of the service knows about a backend. OpenAI and Gemini implement
// it; `AnalystRegistry` picks one per request. Credentials are resolved once at
// the process boundary and handed in explicitly.
// =============================================================================

pub mod gemini;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::types::Backend;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Persona and output requirements shared by every backend.
pub const SYSTEM_MESSAGE: &str = "You are FinGPT, a trading assistant. \
You analyse OHLCV price action and technical indicators. \
Always include:\n\
- Overall trend and momentum\n\
- Key support and resistance zones\n\
- Important risks to watch\n\
This is strictly educational, NOT financial advice.";

/// Produces commentary for a prompt document plus a user question.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn generate(
        &self,
        prompt_text: &str,
        user_question: &str,
        max_output_tokens: u32,
    ) -> Result<String, AnalysisError>;

    fn backend(&self) -> Backend;
}

/// Per-backend model settings.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub openai_model: String,
    pub gemini_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// API keys resolved at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Credentials {
    /// Read `OPENAI_API_KEY` / `GEMINI_API_KEY`; blank values count as unset.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: read(Backend::OpenAi.credential_var()),
            gemini_api_key: read(Backend::Gemini.credential_var()),
        }
    }

    pub fn key_for(&self, backend: Backend) -> Option<&str> {
        match backend {
            Backend::OpenAi => self.openai_api_key.as_deref(),
            Backend::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| if k.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .finish()
    }
}

/// Backend -> client lookup.
#[derive(Default, Clone)]
pub struct AnalystRegistry {
    clients: HashMap<Backend, Arc<dyn AnalysisClient>>,
}

impl AnalystRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for every backend that has a credential.
    pub fn from_credentials(credentials: &Credentials, settings: &AnalysisSettings) -> Result<Self, AnalysisError> {
        let mut registry = Self::new();

        for backend in Backend::ALL {
            let Some(key) = credentials.key_for(backend) else {
                warn!(%backend, var = backend.credential_var(), "no credential; backend disabled");
                continue;
            };
            let client: Arc<dyn AnalysisClient> = match backend {
                Backend::OpenAi => Arc::new(OpenAiClient::new(
                    key,
                    &settings.openai_model,
                    settings.temperature,
                    settings.timeout_secs,
                )?),
                Backend::Gemini => Arc::new(GeminiClient::new(
                    key,
                    &settings.gemini_model,
                    settings.temperature,
                    settings.timeout_secs,
                )?),
            };
            info!(%backend, "analysis backend ready");
            registry.register(client);
        }

        Ok(registry)
    }

    pub fn register(&mut self, client: Arc<dyn AnalysisClient>) {
        self.clients.insert(client.backend(), client);
    }

    /// The client for `backend`, or `MissingCredential` naming its variable.
    pub fn get(&self, backend: Backend) -> Result<Arc<dyn AnalysisClient>, AnalysisError> {
        self.clients
            .get(&backend)
            .cloned()
            .ok_or_else(|| AnalysisError::MissingCredential(backend.credential_var().to_string()))
    }

    pub fn available(&self) -> Vec<Backend> {
        Backend::ALL
            .into_iter()
            .filter(|b| self.clients.contains_key(b))
            .collect()
    }
}

/// Map a transport failure onto the error taxonomy.
pub(crate) fn transport_error(backend: Backend, err: reqwest::Error) -> AnalysisError {
    if err.is_connect() || err.is_timeout() {
        AnalysisError::Connectivity {
            backend: backend.to_string(),
        }
    } else {
        AnalysisError::Backend {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn status_error(backend: Backend, status: reqwest::StatusCode, body: &str) -> AnalysisError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        AnalysisError::Auth {
            backend: backend.to_string(),
        }
    } else {
        AnalysisError::Backend {
            backend: backend.to_string(),
            message: format!("{status}: {body}"),
        }
    }
}
