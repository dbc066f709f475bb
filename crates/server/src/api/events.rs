use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use transcoder_core::{EventFilter, EventRecord, JobStatus};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for event queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for event queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for the events endpoint
#[derive(Debug, Deserialize)]
pub struct EventQueryParams {
    pub job_id: Option<String>,
    /// Events that moved a job into this status
    pub status: Option<String>,
    /// Only completed, failed and cancelled events
    #[serde(default)]
    pub outcomes: bool,
    /// User who created or cancelled the job
    pub actor: Option<String>,
    /// Events at or after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Events at or before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EventQueryResponse {
    pub events: Vec<EventRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query job lifecycle events, newest first
pub async fn query_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventQueryParams>,
) -> Result<Json<EventQueryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut base_filter = match params.job_id {
        Some(ref job_id) => EventFilter::for_job(job_id),
        None => EventFilter::new(),
    };
    if let Some(ref status) = params.status {
        let status: JobStatus = status.parse().map_err(ApiError::bad_request)?;
        base_filter = base_filter.with_transition(status);
    }
    if params.outcomes {
        base_filter = base_filter.outcomes_only();
    }
    if let Some(ref actor) = params.actor {
        base_filter = base_filter.with_actor(actor);
    }
    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = base_filter.clone().with_page(limit, offset);

    let events = state
        .event_store()
        .query(&query_filter)
        .map_err(|e| ApiError::internal(format!("Failed to query events: {}", e)))?;
    let total = state
        .event_store()
        .count(&base_filter)
        .map_err(|e| ApiError::internal(format!("Failed to count events: {}", e)))?;

    Ok(Json(EventQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}
