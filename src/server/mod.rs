//! HTTP API boundary.
//!
//! ```text
//! POST   /query                  {question, session_id?, clear_history?, strategy?}
//! GET    /health                 liveness only
//! DELETE /sessions/{session_id}  forget a conversation
//! ```
//!
//! Each request to `/query` is bounded by the configured request timeout.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::pipeline::{AskOptions, RagPipeline};
use crate::core::{RetrievalMetadata, RetrievedDocument, Strategy};
use crate::error::{CommandError, Error};

/// Session used when a request does not name one.
const DEFAULT_SESSION: &str = "default";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
    request_timeout: Duration,
}

impl AppState {
    /// Wraps a pipeline with the per-request deadline.
    #[must_use]
    pub const fn new(pipeline: Arc<RagPipeline>, request_timeout: Duration) -> Self {
        Self {
            pipeline,
            request_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    clear_history: bool,
    /// Strategy label; the same synonyms as the CLI and MCP tool are accepted.
    #[serde(default)]
    strategy: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    answer: String,
    standalone_query: String,
    retrieved_documents: Vec<RetrievedDocument>,
    retrieval_metadata: RetrievalMetadata,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Error body: `{"error": "..."}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Command(CommandError::InvalidInput(message)) => {
                Self::new(StatusCode::BAD_REQUEST, message)
            }
            Error::Synthesis(e) => {
                error!(error = %e, "answer generation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
            }
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "question must not be empty",
        ));
    }

    let strategy = request
        .strategy
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|label| {
            Strategy::parse(label).ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    format!("unknown strategy {label:?} (expected one of: direct, rewrite, decompose, hyde)"),
                )
            })
        })
        .transpose()?;

    let session_id = request
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let options = AskOptions {
        clear_history: request.clear_history,
        strategy,
    };

    let answer = tokio::time::timeout(
        state.request_timeout,
        state.pipeline.answer(&session_id, &request.question, options),
    )
    .await
    .map_err(|_| {
        warn!(session_id, timeout_secs = state.request_timeout.as_secs(), "request timed out");
        ApiError::new(
            StatusCode::GATEWAY_TIMEOUT,
            "Sorry, the request timed out. Please try again.",
        )
    })??;

    Ok(Json(QueryResponse {
        answer: answer.answer,
        standalone_query: answer.standalone_query.into_inner(),
        retrieved_documents: answer.retrieval.documents,
        retrieval_metadata: answer.retrieval.metadata,
    }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .pipeline
        .clear_history(&session_id)
        .await
        .map_err(|e| ApiError::from(Error::from(e)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/health", get(health))
        .route("/sessions/{session_id}", delete(clear_session))
        .with_state(state)
}

/// Serves the API on `addr` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: &str, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP API stopped");
    Ok(())
}
