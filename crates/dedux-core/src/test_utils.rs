//! Test utilities for dedux-core
//!
//! A mock Ollama-compatible server for exercising the real HTTP client
//! path. Responses can be scripted in order (including 429s for retry
//! tests); with no script queued, the server routes on request shape the
//! way the real prompts look: image attachments get a receipt extraction
//! reply, classification prompts get a deductible-insurance reply, and
//! anything else gets a short text answer.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// A scripted `/api/generate` outcome, consumed in FIFO order
#[derive(Debug, Clone)]
enum Scripted {
    /// 200 with the given text as the model reply
    Reply(String),
    /// Error status with an empty body
    Status(u16),
}

/// A request the server saw, for assertions
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub prompt: String,
    pub image_count: usize,
}

#[derive(Clone, Default)]
struct MockState {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Mock model server for testing and development
pub struct MockReasonerServer {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockReasonerServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a 200 reply with the given model text
    pub fn script_reply(&self, text: impl Into<String>) {
        self.push(Scripted::Reply(text.into()));
    }

    /// Queue a 429 response
    pub fn script_rate_limited(&self) {
        self.push(Scripted::Status(429));
    }

    /// Queue an arbitrary error status
    pub fn script_status(&self, status: u16) {
        self.push(Scripted::Status(status));
    }

    /// Requests received so far on `/api/generate`
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, scripted: Scripted) {
        self.state
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(scripted);
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockReasonerServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2025-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

/// Generate endpoint
async fn handle_generate(
    State(state): State<MockState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let image_count = request.images.as_ref().map(Vec::len).unwrap_or(0);
    state
        .requests
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(RecordedRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            image_count,
        });

    let scripted = state
        .script
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pop_front();

    match scripted {
        Some(Scripted::Status(code)) => {
            let status =
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            status.into_response()
        }
        Some(Scripted::Reply(text)) => reply(request.model, text),
        None => reply(request.model.clone(), default_response(&request)),
    }
}

fn reply(model: String, response: String) -> Response {
    Json(GenerateResponse {
        model,
        response,
        done: true,
    })
    .into_response()
}

/// Content-routed default replies matching the prompt files in prompts/*.md
fn default_response(request: &GenerateRequest) -> String {
    if request.images.as_ref().map(|i| !i.is_empty()).unwrap_or(false) {
        // Vision extraction: a readable hospital receipt
        return r#"{
            "date": "2025-01-15",
            "amount": 18000.00,
            "tax_id": "0105536112014",
            "merchant_name": "Bangkok Hospital"
        }"#
        .to_string();
    }

    if request.prompt.contains("is_deductible") {
        // Classification prompt (classify_deduction.md pattern)
        return r#"{"is_deductible": true, "category": "Health Insurance", "reasoning": "Insurance premium receipt qualifies for the health insurance deduction."}"#
            .to_string();
    }

    "Health insurance premiums are deductible up to 25,000 THB per tax year.".to_string()
}

// Request/Response types for the mock server

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[allow(dead_code)]
    stream: bool,
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{OllamaReasoner, Reasoner, ReasonerClient};
    use crate::classify::Classifier;
    use crate::error::Error;
    use crate::prompts::PromptLibrary;
    use crate::retry::RecordingSleeper;
    use std::sync::RwLock;
    use std::time::Duration;

    fn client(server: &MockReasonerServer) -> OllamaReasoner {
        OllamaReasoner::new(&server.url(), "test-model", "test-vision-model")
    }

    #[tokio::test]
    async fn test_mock_server_health_check() {
        let server = MockReasonerServer::start().await;
        assert!(client(&server).health_check().await);
    }

    #[tokio::test]
    async fn test_mock_server_extracts_receipt() {
        let server = MockReasonerServer::start().await;

        let receipt = client(&server)
            .extract_receipt(b"fake image data")
            .await
            .unwrap();
        assert_eq!(receipt.amount, Some(18_000.0));
        assert_eq!(receipt.merchant_name.as_deref(), Some("Bangkok Hospital"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-vision-model");
        assert_eq!(requests[0].image_count, 1);
    }

    #[tokio::test]
    async fn test_mock_server_generates_text() {
        let server = MockReasonerServer::start().await;

        let reply = client(&server).generate("what can I deduct?").await.unwrap();
        assert!(reply.contains("25,000"));
        assert_eq!(server.requests()[0].model, "test-model");
    }

    #[tokio::test]
    async fn test_scripted_rate_limit_surfaces_as_error() {
        let server = MockReasonerServer::start().await;
        server.script_rate_limited();

        let err = client(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, Error::RateLimited));
    }

    #[tokio::test]
    async fn test_scripted_replies_consumed_in_order() {
        let server = MockReasonerServer::start().await;
        server.script_reply("first");
        server.script_reply("second");

        let c = client(&server);
        assert_eq!(c.generate("p").await.unwrap(), "first");
        assert_eq!(c.generate("p").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_classifier_retries_through_real_http_path() {
        let server = MockReasonerServer::start().await;
        server.script_rate_limited();
        server.script_rate_limited();
        server.script_reply(
            r#"{"is_deductible": true, "category": "Health Insurance", "reasoning": "ok"}"#,
        );

        let sleeper = Arc::new(RecordingSleeper::default());
        let prompts = Arc::new(RwLock::new(PromptLibrary::embedded_only()));
        let classifier = Classifier::new(
            ReasonerClient::Ollama(client(&server)),
            prompts,
            2025,
        )
        .with_sleeper(sleeper.clone());

        let receipt = crate::ai::MockReasoner::sample_receipt();
        let result = classifier.classify(&receipt, "insurance rules context").await;

        assert!(result.is_deductible);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(3), Duration::from_secs(6)]
        );
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockReasonerServer::start().await;
        server.script_status(500);

        let err = client(&server).generate("prompt").await.unwrap_err();
        assert!(!err.is_rate_limit());
    }
}
