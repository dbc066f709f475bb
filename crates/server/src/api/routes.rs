use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{events, handlers, jobs, media, middleware::metrics_middleware, queue};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and host
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/system", get(handlers::get_system))
        // Input media
        .route("/media", post(media::register_media))
        .route("/media/{id}", get(media::get_media))
        // Jobs
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        // Queue and worker pool
        .route("/queue", get(queue::get_queue))
        // Lifecycle events
        .route("/events", get(events::query_events))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
