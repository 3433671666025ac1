//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub saga_name: String,
    /// Messages published but not yet delivered.
    pub pending_messages: usize,
}

/// GET /health — reports liveness and the broker backlog.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        saga_name: state.orchestrator.saga_name().to_string(),
        pending_messages: state.broker.pending_count().await,
    })
}
