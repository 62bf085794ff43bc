//! HTTP server for the session index.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/semantic-search` | `INDEX_VIRTUAL_FILE` or `SEARCH` request envelope |
//! | `GET`  | `/health` | Status, version, and vector store readiness |
//!
//! # Request envelope
//!
//! ```json
//! { "type": "INDEX_VIRTUAL_FILE", "payload": { "chatId": "c1", "filePath": "src/app.ts", "content": "…" } }
//! { "type": "SEARCH", "payload": { "chatId": "c1", "query": "where is the router built" } }
//! ```
//!
//! # Status mapping
//!
//! | Condition | Status |
//! |-----------|--------|
//! | Malformed envelope, missing field, unknown type, invalid input, lock file skipped | 400 |
//! | Store not initialized or unreachable | 503 |
//! | Embedding model failed or timed out | 502 |
//! | Anything else | 500 |
//!
//! Index failures answer `{ "success": false, "error": … }`; search
//! failures answer `{ "error": … }`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based editors
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use session_index_core::{Error, IndexOutcome};

use crate::config::Config;
use crate::protocol::{Envelope, ErrorResponse, IndexResponse, Request, SearchResponse};
use crate::services::Services;

/// Starts the HTTP server on `[server].bind` and initializes the store in
/// the background. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config)?;
    if !config.embedding.is_enabled() {
        tracing::warn!("embedding provider is disabled; index and search requests will fail");
    }
    services.spawn_initialize();

    let app = build_router(services);
    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "session index listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// The application router, without binding a socket.
pub fn build_router(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/semantic-search", post(handle_semantic_search))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

// ============ Errors ============

/// Status for a pipeline error, decided by its innermost cause.
pub fn status_for(err: &Error) -> StatusCode {
    match err.root() {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::EmbeddingFailure(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    reply(
        StatusCode::BAD_REQUEST,
        ErrorResponse {
            error: message.into(),
        },
    )
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    store: String,
}

async fn handle_health(State(services): State<Services>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: services.store_state().to_string(),
    })
}

// ============ POST /api/semantic-search ============

async fn handle_semantic_search(
    State(services): State<Services>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> Response {
    let envelope = match body {
        Ok(Json(envelope)) => envelope,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let request = match Request::try_from(envelope) {
        Ok(request) => request,
        Err(e) => return bad_request(e.to_string()),
    };

    match request {
        Request::IndexVirtualFile {
            chat_id,
            file_path,
            content,
        } => index_virtual_file(&services, &chat_id, &file_path, &content).await,
        Request::Search { chat_id, query } => search(&services, &chat_id, &query).await,
    }
}

async fn index_virtual_file(
    services: &Services,
    chat_id: &str,
    file_path: &str,
    content: &str,
) -> Response {
    match services.indexer.index_file(file_path, content, chat_id).await {
        Ok(IndexOutcome::Indexed { chunk_count }) => {
            reply(StatusCode::OK, IndexResponse::indexed(chunk_count))
        }
        Ok(IndexOutcome::Skipped(_)) => {
            reply(StatusCode::BAD_REQUEST, IndexResponse::failed("skipped"))
        }
        Err(e) => {
            tracing::error!(session_id = chat_id, file_path, error = %e, "index request failed");
            reply(status_for(&e), IndexResponse::failed(e.to_string()))
        }
    }
}

async fn search(services: &Services, chat_id: &str, query: &str) -> Response {
    match services.retriever.search(query, chat_id, None).await {
        Ok(results) => {
            tracing::info!(session_id = chat_id, results = results.len(), "search served");
            reply(StatusCode::OK, SearchResponse { results })
        }
        Err(e) => {
            tracing::error!(session_id = chat_id, error = %e, "search request failed");
            reply(
                status_for(&e),
                ErrorResponse {
                    error: e.to_string(),
                },
            )
        }
    }
}
