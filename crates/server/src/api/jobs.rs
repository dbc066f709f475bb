//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use transcoder_core::{CreateJobRequest, Job, JobPage, JobStatus};

use super::error::ApiError;
use super::middleware::Owner;
use crate::state::AppState;

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by owner; only honoured for callers without `X-Owner-Id`
    pub owner_id: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Zero-based page number
    pub page: Option<u32>,
    /// Page size (default 20, max 100)
    pub size: Option<u32>,
}

/// Submit a new job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.service().create_job(owner.id(), body)?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.service().get_job(&id, owner.scope())?))
}

/// List jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<JobPage>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    // A named caller only ever sees its own jobs.
    let owner_id = match (owner.scope(), params.owner_id.as_deref()) {
        (Some(caller), Some(requested)) if caller != requested => {
            return Err(ApiError::bad_request(format!(
                "owner_id {:?} does not match the X-Owner-Id header",
                requested
            )));
        }
        (Some(caller), _) => Some(caller),
        (None, requested) => requested,
    };
    let page =
        state
            .service()
            .list_jobs(owner_id, status, params.page.unwrap_or(0), params.size)?;
    Ok(Json(page))
}

/// Cancel a queued job
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.service().cancel_job(&id, owner.scope())?))
}
