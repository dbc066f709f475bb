//! Prometheus metrics for the transcoding engine.
//!
//! Collectors are process-global; the server registers them through
//! [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Submission
// =============================================================================

/// Jobs accepted, by priority.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transcoder_jobs_submitted_total", "Total jobs submitted"),
        &["priority"],
    )
    .unwrap()
});

/// Jobs reaching a terminal status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transcoder_jobs_finished_total",
            "Total jobs reaching a terminal status",
        ),
        &["status"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Execution
// =============================================================================

/// Wall-clock time of one transcode, by outcome.
pub static TRANSCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transcoder_transcode_duration_seconds",
            "Duration of transcoder process runs",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Jobs waiting in the queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("transcoder_queue_depth", "Jobs waiting in the queue").unwrap()
});

/// Jobs currently being transcoded.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("transcoder_active_jobs", "Jobs currently being processed").unwrap()
});

/// Worker loops currently alive.
pub static LIVE_WORKERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("transcoder_live_workers", "Worker loops currently running").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(TRANSCODE_DURATION.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        Box::new(LIVE_WORKERS.clone()),
    ]
}
