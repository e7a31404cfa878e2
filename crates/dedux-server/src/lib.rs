//! Dedux Web Server
//!
//! Axum-based REST API for the dedux Thai tax-deduction assistant.
//!
//! Surface:
//! - Pipeline runs (receipt image upload or free-text tax question)
//!   returning the terminal pipeline state
//! - Chat endpoint for knowledge-base Q&A
//! - Transaction ledger CRUD with deduction recomputation on update
//! - Deduction rule reads
//!
//! Security:
//! - Optional static bearer-token auth (constant-time comparison)
//! - Restrictive CORS policy
//! - Request body size limit for receipt uploads

use std::sync::{Arc, RwLock};

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use dedux_core::{
    Advisor, Classifier, Database, ImageStore, KnowledgeClient, Pipeline, PromptLibrary, Reasoner,
    ReasonerClient, Retriever, Settings, SqliteKnowledgeBase, TransactionRecorder,
};

mod handlers;

/// Maximum request body size (10 MB, covers receipt image uploads)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Environment variable holding comma-separated API bearer tokens
pub const API_TOKEN_ENV: &str = "DEDUX_API_TOKEN";

/// Environment variable holding comma-separated allowed CORS origins
pub const ALLOWED_ORIGINS_ENV: &str = "DEDUX_ALLOWED_ORIGINS";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Static bearer tokens accepted on /api routes. Empty disables auth
    /// entirely (local single-user mode).
    pub api_tokens: Vec<String>,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Configuration from the environment
    pub fn from_env() -> Self {
        Self {
            api_tokens: parse_csv_env(API_TOKEN_ENV),
            allowed_origins: parse_csv_env(ALLOWED_ORIGINS_ENV),
        }
    }
}

fn parse_csv_env(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Model backend, kept for health reporting
    pub reasoner: ReasonerClient,
    /// The receipt pipeline state machine
    pub pipeline: Pipeline,
    /// Ledger writes outside a pipeline run (manual create, corrections)
    pub recorder: TransactionRecorder,
    pub tax_year: i32,
}

impl AppState {
    /// Wire the pipeline and its collaborators from a database, a reasoner
    /// backend, and resolved settings.
    pub fn new(
        db: Database,
        reasoner: ReasonerClient,
        settings: &Settings,
        config: ServerConfig,
    ) -> anyhow::Result<Self> {
        let prompts = Arc::new(RwLock::new(PromptLibrary::new()));
        let retriever = Retriever::new(KnowledgeClient::store(SqliteKnowledgeBase::new(
            db.clone(),
        )));
        let classifier = Classifier::new(reasoner.clone(), prompts.clone(), settings.tax_year);
        let recorder = TransactionRecorder::new(db.clone(), settings.tax_year);
        let advisor = Advisor::new(reasoner.clone(), retriever.clone(), prompts);
        let images = ImageStore::new(settings.images_dir())?;

        let pipeline = Pipeline::new(
            reasoner.clone(),
            retriever,
            classifier,
            recorder.clone(),
            advisor,
            Some(images),
        );

        Ok(Self {
            db,
            config,
            reasoner,
            pipeline,
            recorder,
            tax_year: settings.tax_year,
        })
    }
}

/// Authentication middleware - validates static bearer tokens
///
/// Auth is enforced only when tokens are configured. Tokens are compared
/// using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.config.api_tokens.is_empty() {
        return next.run(request).await;
    }

    let token_valid = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| validate_token(token, &state.config.api_tokens))
        .unwrap_or(false);

    if token_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid token");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate a bearer token against the configured tokens using
/// constant-time comparison to prevent timing attacks.
fn validate_token(provided: &str, valid_tokens: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for token in valid_tokens {
        let token_bytes = token.as_bytes();
        // Only compare if lengths match (constant-time for same-length tokens)
        if provided_bytes.len() == token_bytes.len()
            && bool::from(provided_bytes.ct_eq(token_bytes))
        {
            return true;
        }
    }
    false
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Pipeline
        .route("/pipeline/runs", post(handlers::run_pipeline))
        // Chat
        .route("/chat", post(handlers::chat))
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction)
                .patch(handlers::update_transaction)
                .delete(handlers::delete_transaction),
        )
        // Rules
        .route("/rules", get(handlers::list_rules))
        .route("/rules/:id", get(handlers::get_rule))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Build CORS layer
    let cors = if state.config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        // Liveness probe stays outside the authenticated API surface
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_SIZE))
}

/// Start the server
pub async fn serve(
    db: Database,
    reasoner: ReasonerClient,
    settings: &Settings,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    serve_with_config(db, reasoner, settings, host, port, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    reasoner: ReasonerClient,
    settings: &Settings,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if config.api_tokens.is_empty() {
        warn!(
            "⚠️  No API token configured (set {}) - every request is accepted",
            API_TOKEN_ENV
        );
    } else {
        info!("API token auth enabled ({} token(s))", config.api_tokens.len());
    }

    check_reasoner_connection(&reasoner).await;

    let state = Arc::new(AppState::new(db, reasoner, settings, config)?);
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log model server connection status
async fn check_reasoner_connection(reasoner: &ReasonerClient) {
    if reasoner.health_check().await {
        info!(
            "✅ Model server connected: {} (model: {})",
            reasoner.host(),
            reasoner.model()
        );
    } else {
        warn!(
            "⚠️  Model server not responding: {} (model: {})",
            reasoner.host(),
            reasoner.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map a core error onto the status it deserves at the API boundary
    pub(crate) fn from_core(err: dedux_core::Error) -> Self {
        match err {
            dedux_core::Error::NotFound(msg) => Self::not_found(&msg),
            dedux_core::Error::InvalidData(msg) => Self::bad_request(&msg),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
