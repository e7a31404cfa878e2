//! Pluggable local reasoner abstraction
//!
//! Backend-agnostic interface for the two model calls the pipeline makes:
//! vision extraction of receipt fields and free-form text generation
//! (classification and Q&A prompts). All backends run locally.
//!
//! # Architecture
//!
//! - `Reasoner` trait: defines the interface for model operations
//! - `ReasonerClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaReasoner`, `MockReasoner`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Text model name (default: llama3.2)
//! - `OLLAMA_VISION_MODEL`: Vision model for receipt extraction
//!   (default: llama3.2-vision)

mod mock;
mod ollama;
pub mod parsing;

pub use mock::MockReasoner;
pub use ollama::OllamaReasoner;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ReceiptData;

/// Trait defining the interface for all reasoner backends
///
/// Backends must be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Extract structured receipt fields from an image
    async fn extract_receipt(&self, image: &[u8]) -> Result<ReceiptData>;

    /// Generate a completion for a prompt, returning the raw model text
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete reasoner client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ReasonerClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaReasoner),
    /// Mock backend for testing
    Mock(MockReasoner),
}

impl ReasonerClient {
    /// Create a reasoner client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `ollama` (default): Uses OLLAMA_HOST, OLLAMA_MODEL, OLLAMA_VISION_MODEL
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaReasoner::from_env().map(ReasonerClient::Ollama),
            "mock" => Some(ReasonerClient::Mock(MockReasoner::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaReasoner::from_env().map(ReasonerClient::Ollama)
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str, vision_model: &str) -> Self {
        ReasonerClient::Ollama(OllamaReasoner::new(host, model, vision_model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ReasonerClient::Mock(MockReasoner::new())
    }

    /// Create a new instance with a different text model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            ReasonerClient::Ollama(b) => ReasonerClient::Ollama(b.with_model(model)),
            ReasonerClient::Mock(b) => ReasonerClient::Mock(b.with_model(model)),
        }
    }
}

// Implement Reasoner for ReasonerClient by delegating to the inner backend
#[async_trait]
impl Reasoner for ReasonerClient {
    async fn extract_receipt(&self, image: &[u8]) -> Result<ReceiptData> {
        match self {
            ReasonerClient::Ollama(b) => b.extract_receipt(image).await,
            ReasonerClient::Mock(b) => b.extract_receipt(image).await,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            ReasonerClient::Ollama(b) => b.generate(prompt).await,
            ReasonerClient::Mock(b) => b.generate(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ReasonerClient::Ollama(b) => b.health_check().await,
            ReasonerClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ReasonerClient::Ollama(b) => b.model(),
            ReasonerClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ReasonerClient::Ollama(b) => b.host(),
            ReasonerClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_delegates_to_mock() {
        let client = ReasonerClient::mock();
        assert!(client.health_check().await);
        assert_eq!(client.model(), "mock");
    }

    #[test]
    fn test_from_env_mock_backend() {
        std::env::set_var("AI_BACKEND", "mock");
        let client = ReasonerClient::from_env();
        assert!(matches!(client, Some(ReasonerClient::Mock(_))));
        std::env::remove_var("AI_BACKEND");
    }
}
