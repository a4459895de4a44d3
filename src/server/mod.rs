//! HTTP binding of the answer pipeline

use crate::context::SystemStatus;
use crate::error::{AdvisorError, Result};
use crate::pipeline::{AnswerPipeline, SourceExcerpt};
use crate::prompt::ConversationTurn;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument};
use uuid::Uuid;

pub const EXAMPLE_QUESTIONS: [&str; 8] = [
    "What are the main pests affecting cotton crops?",
    "How to control pink bollworm in cotton?",
    "What is the recommended dosage for whitefly control?",
    "What preventive measures can reduce pest infestation?",
    "What are the symptoms of cotton leaf curl disease?",
    "How to identify early signs of pest infestation?",
    "What biological control methods are effective?",
    "What are the best agricultural practices?",
];

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<AnswerPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<AnswerPipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<Vec<ConversationTurn>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceExcerpt>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Router with CORS for `allowed_origins` (`*` allows any origin)
pub fn app_router(state: AppState, allowed_origins: &[String]) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(allowed_origins)?)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/", get(root))
        .route("/api/status", get(status))
        .route("/api/chat", post(chat))
        .route("/api/examples", get(examples))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

fn allow_origin(origins: &[String]) -> Result<AllowOrigin> {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(AllowOrigin::any());
    }

    let values = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| AdvisorError::Server(format!("Invalid CORS origin: {}", origin)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(AllowOrigin::list(values))
}

pub async fn run_server(pipeline: Arc<AnswerPipeline>, bind: &str, allowed_origins: &[String]) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| AdvisorError::Server(format!("Invalid bind address: {}", bind)))?;
    let app = app_router(AppState::new(pipeline), allowed_origins)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AdvisorError::Io {
            source: e,
            context: format!("Failed to bind {}", addr),
        })?;
    info!("Cotton advisor listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AdvisorError::Server(e.to_string()))?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Cotton Advisory API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus::of(&state.pipeline))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    // A panic inside the pipeline becomes a 500
    let pipeline = state.pipeline.clone();
    let history = request.context.unwrap_or_default();
    let message = request.message;
    let handle = tokio::spawn(
        async move { pipeline.answer(&message, &history).await }.instrument(span),
    );

    let result = handle.await.map_err(|e| {
        tracing::error!(%request_id, "Chat task failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: "Internal server error".to_string(),
            }),
        )
    })?;

    let sources = if result.sources.is_empty() {
        None
    } else {
        Some(result.sources)
    };
    Ok(Json(ChatResponse {
        answer: result.answer_text,
        success: result.success,
        sources,
    }))
}

async fn examples() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "examples": EXAMPLE_QUESTIONS }))
}
