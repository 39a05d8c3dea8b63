//! HTTP server: streaming chat producer and document management API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat/stream` | Stream a generated answer as framed events |
//! | `POST` | `/documents/add` | Add a document (title + body) |
//! | `GET`  | `/documents` | List documents |
//! | `DELETE` | `/documents/clear` | Remove all documents |
//! | `DELETE` | `/documents/{id}` | Remove one document |
//! | `GET`  | `/documents/stats` | Document/chunk counts |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Stream contract
//!
//! `/chat/stream` responds with `text/event-stream`-compatible framing:
//! one `data: <payload>` line per event, blank-line separated, ending in
//! `data: [DONE]`. Control payloads are `[METADATA] <text>`,
//! `[CONTEXT] <text>`, and `[ERROR] <message>`; anything else is answer
//! text. Generation failures after the response has started are reported
//! in-band as an `[ERROR]` frame.
//!
//! # Error contract
//!
//! Non-streaming errors use the JSON schema
//! `{ "error": { "code": "...", "message": "..." } }` with codes
//! `bad_request` (400), `not_found` (404), and `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the reference UI is a
//! browser app served from a different origin.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::db;
use crate::generate::{build_prompt, create_generator, describe_sources, Generator};
use crate::migrate;
use crate::models::{ChatRequest, CorpusStats};
use crate::wire::{encode_done, encode_tagged, encode_text, CONTEXT_TAG, ERROR_TAG, METADATA_TAG};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    corpus: CorpusStore,
    generator: Arc<dyn Generator>,
    token_delay: Duration,
}

/// Build the router against a fresh database connection. Used by both
/// [`run_server`] and in-process tests.
pub async fn build_app(config: &Config) -> anyhow::Result<Router> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let state = AppState {
        corpus: CorpusStore::new(
            pool,
            config.chunking.clone(),
            config.retrieval.clone(),
        ),
        generator: Arc::from(create_generator(&config.generator)?),
        token_delay: Duration::from_millis(config.generator.token_delay_ms),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/chat/stream", post(handle_chat_stream))
        .route("/documents/add", post(handle_add_document))
        .route("/documents", get(handle_list_documents))
        .route("/documents/clear", delete(handle_clear_documents))
        .route("/documents/{id}", delete(handle_remove_document))
        .route("/documents/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state))
}

/// Start the HTTP server on the configured bind address and run until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = build_app(config).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("corpus-chat server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error response body.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ POST /chat/stream ============

/// Handler for `POST /chat/stream`.
///
/// Validation failures are rejected with a JSON 400 before any frame is
/// written; once frames flow, failures are in-band `[ERROR]` frames.
async fn handle_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let mut frames: Vec<String> = Vec::new();
    frames.push(encode_tagged(
        METADATA_TAG,
        &format!("model={}", state.generator.model_name()),
    ));

    // Retrieval only when asked for; an empty corpus simply grounds
    // nothing.
    let context = if request.use_rag {
        state
            .corpus
            .search(&request.message)
            .await
            .map_err(internal)?
    } else {
        Vec::new()
    };

    if !context.is_empty() {
        frames.push(encode_tagged(CONTEXT_TAG, &describe_sources(&context)));
    }

    let prompt = build_prompt(&request.message, &context);
    match state.generator.generate(&prompt).await {
        Ok(tokens) => {
            frames.extend(tokens.iter().map(|t| encode_text(t)));
            frames.push(encode_done());
        }
        Err(e) => {
            // Terminal failure frame instead of [DONE]; the stream still
            // closes cleanly from the transport's point of view.
            frames.push(encode_tagged(ERROR_TAG, &e.to_string()));
        }
    }

    let delay = state.token_delay;
    let stream = futures::stream::iter(frames).then(move |frame| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, Infallible>(frame)
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| internal(e.into()))?)
}

// ============ Document management ============

#[derive(Deserialize)]
struct AddDocumentRequest {
    title: String,
    body: String,
}

#[derive(Serialize)]
struct AddDocumentResponse {
    id: String,
    title: String,
    chunks: i64,
}

async fn handle_add_document(
    State(state): State<AppState>,
    Json(request): Json<AddDocumentRequest>,
) -> Result<Json<AddDocumentResponse>, AppError> {
    if request.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }
    if request.body.trim().is_empty() {
        return Err(bad_request("body must not be empty"));
    }

    // API documents get a fresh natural key per title; re-adding the same
    // title replaces the previous version.
    let stored = state
        .corpus
        .add_document(request.title.trim(), &request.body, "api", request.title.trim())
        .await
        .map_err(internal)?;

    Ok(Json(AddDocumentResponse {
        id: stored.id,
        title: stored.title,
        chunks: stored.chunks,
    }))
}

#[derive(Serialize)]
struct DocumentInfo {
    id: String,
    title: String,
    source: String,
    chunks: i64,
}

#[derive(Serialize)]
struct ListDocumentsResponse {
    documents: Vec<DocumentInfo>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<ListDocumentsResponse>, AppError> {
    let documents = state
        .corpus
        .list_documents()
        .await
        .map_err(internal)?
        .into_iter()
        .map(|d| DocumentInfo {
            id: d.id,
            title: d.title,
            source: d.source,
            chunks: d.chunks,
        })
        .collect();
    Ok(Json(ListDocumentsResponse { documents }))
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_remove_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.corpus.remove_document(&id).await.map_err(internal)?;
    if !removed {
        return Err(not_found(format!("no document with id: {}", id)));
    }
    Ok(Json(MessageResponse {
        message: format!("Document {} removed", id),
    }))
}

async fn handle_clear_documents(
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.corpus.clear().await.map_err(internal)?;
    Ok(Json(MessageResponse {
        message: format!("Removed {} documents", removed),
    }))
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<CorpusStats>, AppError> {
    state.corpus.stats().await.map(Json).map_err(internal)
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
