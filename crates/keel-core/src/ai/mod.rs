//! Pluggable local AI backend abstraction
//!
//! Keel uses AI for one thing only: advisory free-text summaries layered on
//! top of audit risk reports. Classification and tax math never depend on
//! it - a missing or failing backend degrades to "no summary".
//!
//! # Architecture
//!
//! - `AiBackend` trait: the single `complete(system, user)` operation
//! - `AiClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2)

mod mock;
mod ollama;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Run one completion: a system prompt plus a user prompt in, text out
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// The model this backend is configured with
    fn model(&self) -> &str;

    /// The host this backend talks to
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AiClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AiClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `ollama` (default): Uses OLLAMA_HOST and OLLAMA_MODEL
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AiClient::Ollama),
            "mock" => Some(AiClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AiClient::Ollama)
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AiClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AiClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AiBackend for AiClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        match self {
            AiClient::Ollama(b) => b.complete(system_prompt, user_prompt).await,
            AiClient::Mock(b) => b.complete(system_prompt, user_prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AiClient::Ollama(b) => b.health_check().await,
            AiClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AiClient::Ollama(b) => b.model(),
            AiClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AiClient::Ollama(b) => b.host(),
            AiClient::Mock(b) => b.host(),
        }
    }
}
