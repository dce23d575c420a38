//! HTTP service: grounded chat, organization summaries, and the bundled
//! front-end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer a question from one organization's documents |
//! | `POST` | `/api/summary` | HTML summary of one organization's documents |
//! | `GET`  | `/api/health` | Status, version, and vector store availability |
//! | any    | everything else | Static front-end, falling back to `index.html` |
//!
//! # Error Contract
//!
//! Unknown `/api/*` paths, wrong methods and malformed request bodies get a
//! JSON error:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no API route for /api/nope" } }
//! ```
//!
//! LLM failures and an unavailable vector store are not HTTP errors: the
//! answer body carries the (localized) message instead.

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::answer::{Answerer, Language};
use crate::config::Config;
use crate::index::VectorIndex;
use crate::llm::create_chat_model;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    answerer: Arc<Answerer>,
}

impl AppState {
    pub fn new(answerer: Answerer) -> Self {
        Self {
            answerer: Arc::new(answerer),
        }
    }
}

/// Builds the full router. `static_dir` is the front-end bundle.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let api = Router::new()
        .route("/chat", post(handle_chat))
        .route("/summary", post(handle_summary))
        .route("/health", get(handle_health))
        .fallback(handle_api_not_found)
        .method_not_allowed_fallback(handle_api_method_not_allowed);

    Router::new()
        .nest("/api", api)
        .fallback_service(spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Starts the HTTP service and runs until Ctrl-C.
///
/// A vector store that cannot be opened does not stop the service: every
/// answer then reports that no information was found.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let index = match VectorIndex::open_existing(config).await {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "vector store unavailable; answers will be empty");
            None
        }
    };
    let chat = create_chat_model(&config.llm)?;
    tracing::info!(provider = chat.name(), model = chat.model(), "chat model ready");

    if !config.server.static_dir.join("index.html").is_file() {
        tracing::warn!(
            dir = %config.server.static_dir.display(),
            "front-end bundle not found; only /api routes will be useful"
        );
    }

    let state = AppState::new(Answerer::new(index, chat, config));
    let app = build_router(state, &config.server.static_dir);

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

async fn handle_api_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: format!("no API route for {}", uri.path()),
    }
}

async fn handle_api_method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    AppError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        code: "method_not_allowed",
        message: format!("{} is not allowed on {}", method, uri.path()),
    }
}

// ============ Request / response bodies ============

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub org_id: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub org_id: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub response: String,
}

// ============ Handlers ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, AppError> {
    let Json(req) = body?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    if req.org_id.trim().is_empty() {
        return Err(bad_request("org_id must not be empty"));
    }

    let lang = Language::parse(req.language.as_deref());
    let response = state
        .answerer
        .answer_query(&req.query, &req.org_id, lang)
        .await;
    Ok(Json(AnswerResponse { response }))
}

async fn handle_summary(
    State(state): State<AppState>,
    body: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, AppError> {
    let Json(req) = body?;
    if req.org_id.trim().is_empty() {
        return Err(bad_request("org_id must not be empty"));
    }

    let lang = Language::parse(req.language.as_deref());
    let response = state
        .answerer
        .summarize_org(&req.org_id, &req.country_name, lang)
        .await;
    Ok(Json(AnswerResponse { response }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// `"ok"` when the vector store was opened at startup.
    store: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: if state.answerer.has_index() {
            "ok"
        } else {
            "unavailable"
        },
    })
}
