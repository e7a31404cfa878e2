//! Pipeline run and chat handlers

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AppError, AppState, MAX_UPLOAD_SIZE};
use dedux_core::{PipelineRequest, PipelineState, DEFAULT_USER_ID};

/// JSON body for a pipeline run
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub question: String,
    /// Base64 receipt image, raw or as a data URI
    pub image: Option<String>,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// POST /api/pipeline/runs - Run the receipt pipeline
///
/// Accepts either a multipart form (an `image` file plus optional `user_id`
/// and `question` text fields) or a JSON body with a base64 `image`. The
/// response is the terminal pipeline state.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<PipelineState>, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let run = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::bad_request(&format!("Invalid multipart body: {}", e)))?;
        request_from_multipart(multipart).await?
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
            .await
            .map_err(|_| {
                AppError::bad_request("Invalid request body or file too large (max 10MB)")
            })?;
        request_from_json(&bytes)?
    };

    Ok(Json(state.pipeline.run(run).await))
}

async fn request_from_multipart(mut multipart: Multipart) -> Result<PipelineRequest, AppError> {
    let mut run = PipelineRequest {
        user_id: DEFAULT_USER_ID.to_string(),
        ..Default::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::bad_request(&format!("Failed to read image field: {}", e))
                })?;
                if !data.is_empty() {
                    run.image = Some(data.to_vec());
                }
            }
            "user_id" => {
                run.user_id = field.text().await.map_err(|e| {
                    AppError::bad_request(&format!("Failed to read user_id field: {}", e))
                })?;
            }
            "question" => {
                run.question = field.text().await.map_err(|e| {
                    AppError::bad_request(&format!("Failed to read question field: {}", e))
                })?;
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(run)
}

fn request_from_json(bytes: &[u8]) -> Result<PipelineRequest, AppError> {
    let body: RunRequest = serde_json::from_slice(bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON body: {}", e)))?;

    let image = body.image.as_deref().map(decode_image).transpose()?;

    Ok(PipelineRequest {
        user_id: body.user_id,
        question: body.question,
        image,
    })
}

/// Decode a base64 image, tolerating data-URI prefixes
/// ("data:image/jpeg;base64,...")
fn decode_image(value: &str) -> Result<Vec<u8>, AppError> {
    let encoded = match value.split_once("base64,") {
        Some((_, rest)) => rest,
        None => value,
    };

    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::bad_request("Invalid base64 image data"))
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub message: String,
}

/// Chat response body
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// POST /api/chat - Answer a free-text tax question over the knowledge base
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::bad_request("Message cannot be empty"));
    }

    let run = PipelineRequest {
        user_id: body.user_id,
        question: body.message,
        image: None,
    };
    let outcome = state.pipeline.run(run).await;

    Ok(Json(ChatResponse {
        reply: outcome.reply,
    }))
}
