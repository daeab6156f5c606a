//! /api/status: live sessions, connections and outstanding chunk requests.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Sessions known to this process.
    pub sessions: usize,
    /// Sessions with a control connection attached.
    pub connected: usize,
    /// Advertised files across all sessions.
    pub files: usize,
    /// Chunk requests still waiting for a DATA reply.
    pub pending_chunks: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let mut status = StatusResponse {
        sessions: 0,
        connected: 0,
        files: 0,
        pending_chunks: 0,
    };
    for session in state.directory.sessions() {
        status.sessions += 1;
        status.files += session.files.len();
        if session.is_connected().await {
            status.connected += 1;
        }
        status.pending_chunks += session.chunks.stats().await.pending;
    }
    Json(status)
}
