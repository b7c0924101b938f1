//! # HTTP API
//!
//! Thin axum boundary over one shared chain.
//!
//! | Method | Path          | Description                               |
//! |--------|---------------|-------------------------------------------|
//! | POST   | `/mine_block` | Mine `{"data": ...}` onto the chain       |
//! | GET    | `/get_chain`  | Every block, genesis first, and the length |
//! | GET    | `/is_valid`   | Re-validate the whole chain               |
//!
//! Mining is CPU-bound, so it runs on the blocking pool with the chain lock
//! held from tail lookup to append. Concurrent mining requests queue on that
//! lock, and reads wait on it asynchronously without holding a worker thread.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::block::Block;
use crate::chain::{Chain, Fault, MinedBlock};
use crate::config::ChainConfig;
use crate::error::ChainError;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Mutex<Chain>>,
    /// Raised on shutdown to stop an in-flight proof search.
    pub cancel: Arc<AtomicBool>,
}

impl AppState {
    /// Build a fresh chain from configuration, wired to this state's cancel flag.
    pub fn from_config(config: &ChainConfig) -> Result<Self, ChainError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let pow = config.proof_of_work().with_cancel_flag(Arc::clone(&cancel));
        let chain = Chain::with_pow(config.genesis_data.clone(), pow)?;
        Ok(Self {
            chain: Arc::new(Mutex::new(chain)),
            cancel,
        })
    }

    /// Ask any running proof search to stop.
    pub fn shutdown(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MineRequest {
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct MineResponse {
    pub message: String,
    #[serde(flatten)]
    pub block: MinedBlock,
}

#[derive(Debug, Serialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct ValidityResponse {
    #[serde(rename = "Success")]
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    /// The blocking mining task panicked or was aborted.
    Task(String),
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(err @ (ChainError::Cancelled | ChainError::AttemptsExhausted { .. })) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            ApiError::Chain(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Task(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        tracing::error!(%status, %message, "request failed");
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/mine_block", post(mine_block_handler))
        .route("/get_chain", get(get_chain_handler))
        .route("/is_valid", get(is_valid_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn mine_block_handler(
    State(state): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<MineResponse>, ApiError> {
    let chain = Arc::clone(&state.chain);
    let block = tokio::task::spawn_blocking(move || chain.blocking_lock().mine(req.data))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))??;

    Ok(Json(MineResponse {
        message: "Congrats, you have mined a block".to_string(),
        block,
    }))
}

async fn get_chain_handler(State(state): State<AppState>) -> Json<ChainResponse> {
    let chain = state.chain.lock().await.list_blocks();
    let length = chain.len();
    Json(ChainResponse { chain, length })
}

async fn is_valid_handler(State(state): State<AppState>) -> Json<ValidityResponse> {
    let report = state.chain.lock().await.verify();
    Json(ValidityResponse {
        success: report.is_valid(),
        message: report.message().to_string(),
        failed_index: report.failure.map(|(index, _)| index),
        fault: report.failure.map(|(_, fault)| fault),
    })
}
