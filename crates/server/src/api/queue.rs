use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use transcoder_core::{PoolStatus, QueuedEntry};

use crate::state::AppState;

/// Worker pool status plus the waiting jobs in dequeue order
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub pool: PoolStatus,
    pub queued: Vec<QueuedEntry>,
}

pub async fn get_queue(State(state): State<Arc<AppState>>) -> Json<QueueResponse> {
    Json(QueueResponse {
        pool: state.pool().status(),
        queued: state.service().queue().snapshot(),
    })
}
