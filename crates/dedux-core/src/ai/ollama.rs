//! Ollama backend implementation
//!
//! HTTP client for the Ollama API. Uses the prompt library for
//! customizable prompts and a separate vision model for receipt
//! extraction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::ReceiptData;
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::parse_receipt_fields;
use super::Reasoner;

/// Default text model when OLLAMA_MODEL is unset.
const DEFAULT_MODEL: &str = "llama3.2";

/// Default vision model when OLLAMA_VISION_MODEL is unset.
const DEFAULT_VISION_MODEL: &str = "llama3.2-vision";

/// Ollama backend
///
/// Text generation goes to the configured text model; receipt extraction
/// goes to the configured vision model with the image attached base64.
/// HTTP 429 from the server maps to `Error::RateLimited` so the
/// classifier's retry policy can tell it apart from hard failures.
#[derive(Clone)]
pub struct OllamaReasoner {
    http_client: Client,
    base_url: String,
    model: String,
    vision_model: String,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaReasoner {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str, vision_model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            vision_model: vision_model.to_string(),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create a new instance with a different text model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: model.to_string(),
            vision_model: self.vision_model.clone(),
            prompts: self.prompts.clone(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let vision_model = std::env::var("OLLAMA_VISION_MODEL")
            .unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string());
        Some(Self::new(&host, &model, &vision_model))
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Request to Ollama API with images (for vision models)
#[derive(Debug, Serialize)]
struct OllamaVisionRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl Reasoner for OllamaReasoner {
    async fn extract_receipt(&self, image: &[u8]) -> Result<ReceiptData> {
        let prompt = {
            let mut prompts = self
                .prompts
                .write()
                .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
            let template = prompts.get(PromptId::ExtractReceipt)?;
            template.render_user(&HashMap::new())
        };

        let base64_image = base64::engine::general_purpose::STANDARD.encode(image);

        let request = OllamaVisionRequest {
            model: self.vision_model.clone(),
            prompt,
            images: vec![base64_image],
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !response.status().is_success() {
            return Err(Error::Http(response.error_for_status().unwrap_err()));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!("Ollama extraction response: {}", ollama_response.response);

        parse_receipt_fields(&ollama_response.response)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !response.status().is_success() {
            return Err(Error::Http(response.error_for_status().unwrap_err()));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!("Ollama generate response: {}", ollama_response.response);

        Ok(ollama_response.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
