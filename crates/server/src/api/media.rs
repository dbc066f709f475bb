use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use transcoder_core::{MediaFile, RegisterMediaRequest};

use super::error::ApiError;
use super::middleware::Owner;
use crate::state::AppState;

/// Probe a local file and register it as a job input
pub async fn register_media(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(body): Json<RegisterMediaRequest>,
) -> Result<(StatusCode, Json<MediaFile>), ApiError> {
    let media = state.service().register_media(owner.id(), body).await?;
    Ok((StatusCode::CREATED, Json(media)))
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Path(id): Path<String>,
) -> Result<Json<MediaFile>, ApiError> {
    Ok(Json(state.service().get_media(&id, owner.scope())?))
}
