//! HTTP API for the Torus daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Command submission (runs the full pipeline)
//! - Execution lookup / cancel / list / cleanup
//! - System status (named values, demo flag)
//! - WebSocket live feed of simulator samples and execution events

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use torus_domain::{Execution, TargetId};
use torus_exec::{DevicePort, ExecError, ExecutionEngine, ExecutionEventKind};
use torus_sim::{FeedbackSample, FeedbackSimulator};

// =============================================================================
// Live Feed
// =============================================================================

/// One frame on the WebSocket live feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedFrame {
    /// A simulator tick produced a feedback sample
    Sample {
        /// The sample
        sample: FeedbackSample,
    },
    /// An execution transitioned
    Execution {
        /// Transition kind
        kind: ExecutionEventKind,
        /// Execution snapshot
        execution: Execution,
    },
}

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<D: DevicePort + 'static> {
    /// Execution engine
    pub engine: Arc<ExecutionEngine<D>>,
    /// Shared feedback simulator (demo device network)
    pub simulator: Arc<Mutex<FeedbackSimulator>>,
    /// Live feed fan-out
    pub feed: broadcast::Sender<FeedFrame>,
    /// Whether the daemon runs without a semantic backend
    pub demo_mode: bool,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy"
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Request to execute a natural-language command.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// The instruction text
    pub command: String,
    /// Optional caller-supplied execution id
    #[serde(default)]
    pub execution_id: Option<String>,
}

/// List of tracked executions.
#[derive(Debug, Serialize)]
pub struct ExecutionListResponse {
    /// Number of tracked executions
    pub count: usize,
    /// Snapshots
    pub executions: Vec<Execution>,
}

/// Cancel outcome.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Whether a live execution was cancelled
    pub cancelled: bool,
}

/// Cleanup outcome.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    /// How many terminal executions were purged
    pub removed: usize,
}

/// System status snapshot.
#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    /// True when running without a semantic backend
    pub demo_mode: bool,
    /// Current named values from the simulator
    pub values: BTreeMap<TargetId, f64>,
    /// Number of tracked executions
    pub tracked_executions: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error
    pub error: String,
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<D: DevicePort + 'static>(state: Arc<ApiState<D>>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/commands", post(submit_command_handler))
        .route("/executions", get(list_executions_handler))
        .route("/executions/cleanup", post(cleanup_handler))
        .route("/executions/:id", get(get_execution_handler))
        .route("/executions/:id/cancel", post(cancel_handler))
        .route("/system/status", get(system_status_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Submit a command and run it to a terminal state.
async fn submit_command_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Execution>, (StatusCode, Json<ErrorResponse>)> {
    if request.command.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: "Command is required".to_string() }),
        ));
    }

    let execution = state
        .engine
        .submit(&request.command, request.execution_id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(execution))
}

/// Get a single execution.
async fn get_execution_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Execution>, (StatusCode, Json<ErrorResponse>)> {
    state.engine.get(&id).await.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("Execution not found: {}", id) }),
        )
    })
}

/// Cancel an execution.
async fn cancel_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    Path(id): Path<String>,
) -> Json<CancelResponse> {
    let cancelled = state.engine.cancel(&id).await;
    Json(CancelResponse { cancelled })
}

/// List all tracked executions.
async fn list_executions_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
) -> Json<ExecutionListResponse> {
    let executions = state.engine.list_active().await;
    Json(ExecutionListResponse { count: executions.len(), executions })
}

/// Purge terminal executions.
async fn cleanup_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
) -> Json<CleanupResponse> {
    let removed = state.engine.cleanup_terminal().await;
    Json(CleanupResponse { removed })
}

/// Current system status.
async fn system_status_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
) -> Json<SystemStatusResponse> {
    let values = state.simulator.lock().await.snapshot();
    let tracked = state.engine.registry().len().await;

    Json(SystemStatusResponse {
        demo_mode: state.demo_mode,
        values,
        tracked_executions: tracked,
    })
}

/// Upgrade to the WebSocket live feed.
async fn ws_handler<D: DevicePort + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let receiver = state.feed.subscribe();
    upgrade.on_upgrade(move |socket| stream_feed(socket, receiver))
}

/// Push feed frames to one WebSocket client until it disconnects.
async fn stream_feed(mut socket: WebSocket, mut receiver: broadcast::Receiver<FeedFrame>) {
    loop {
        tokio::select! {
            frame = receiver.recv() => {
                let frame = match frame {
                    Ok(frame) => frame,
                    // Lagged: skip missed frames, keep streaming
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "WebSocket client lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ignore pings/client chatter
                    Some(Ok(_)) => {},
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

fn to_error_response(error: ExecError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        ExecError::DuplicateExecution(_) => StatusCode::CONFLICT,
        ExecError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: error.to_string() }))
}
