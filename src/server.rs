//! JSON HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/answer` | Contextual answer for `{ "input" }` |
//! | `POST` | `/retrieve` | Tiered retrieval for `{ "query", "min_results"? }` |
//! | `POST` | `/documents` | Embed and store `{ "content", "metadata"? }` |
//! | `GET`  | `/documents` | Every stored document's content |
//! | `POST` | `/keywords` | Keyword extraction for `{ "text" }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "data_integrity", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `data_integrity` (502), `backend` (502),
//! `ingestion` (502), `timeout` (408).
//!
//! A request whose client disconnects is dropped together with every
//! in-flight backend call it started.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use context_relay_core::store::DOCUMENTS_TABLE;
use context_relay_core::{ContextualResponse, Document, Metadata, RelayError};

use crate::config::Config;
use crate::relay::Relay;

/// Starts the server on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let relay = Relay::open(config).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(relay)).await?;
    Ok(())
}

/// All routes with permissive CORS, bound to `relay`.
pub fn router(relay: Relay) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/answer", post(handle_answer))
        .route("/retrieve", post(handle_retrieve))
        .route("/documents", post(handle_store).get(handle_list_documents))
        .route("/keywords", post(handle_keywords))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(relay)
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    input: String,
}

async fn handle_answer(
    State(relay): State<Relay>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<ContextualResponse>, AppError> {
    let response = relay.responder.answer(&req.input).await?;
    Ok(Json(response))
}

// ============ POST /retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    #[serde(default)]
    min_results: Option<usize>,
}

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<String>,
}

async fn handle_retrieve(
    State(relay): State<Relay>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let min_results = req
        .min_results
        .unwrap_or_else(|| relay.retriever.min_results());
    let results = relay.retriever.retrieve(&req.query, min_results).await?;
    Ok(Json(RetrieveResponse {
        results: results.into_vec(),
    }))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct StoreRequest {
    content: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

async fn handle_store(
    State(relay): State<Relay>,
    Json(req): Json<StoreRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let doc = relay
        .ingestor
        .store_embedding(&req.content, req.metadata.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<String>,
}

async fn handle_list_documents(
    State(relay): State<Relay>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = relay.retriever.all_documents(DOCUMENTS_TABLE).await?;
    Ok(Json(DocumentListResponse { documents }))
}

// ============ POST /keywords ============

#[derive(Deserialize)]
struct KeywordsRequest {
    text: String,
}

#[derive(Serialize)]
struct KeywordsResponse {
    keywords: Vec<String>,
}

async fn handle_keywords(
    State(relay): State<Relay>,
    Json(req): Json<KeywordsRequest>,
) -> Result<Json<KeywordsResponse>, AppError> {
    let keywords = relay.keywords.extract_keywords(&req.text).await?;
    Ok(Json(KeywordsResponse { keywords }))
}
