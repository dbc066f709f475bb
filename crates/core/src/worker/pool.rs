//! Worker pool: N loops pulling from the job queue.

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::config::WorkerConfig;
use crate::events::{EventHandle, JobEvent};
use crate::job::{Job, JobError, JobStatus, JobStore, TransitionError};
use crate::media::{FileStore, FileStoreError};
use crate::metrics;
use crate::queue::JobQueue;
use crate::transcoder::{
    CommandBuilder, InputDescriptor, ProgressUpdate, TranscodeError, Transcoder,
};

/// Errors that abort a job run before a terminal status is reached.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to persist job: {0}")]
    Persist(#[from] JobError),

    #[error("Failed to resolve files: {0}")]
    Files(#[from] FileStoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Everything a worker needs to run a job.
#[derive(Clone)]
pub struct WorkerDeps {
    pub queue: Arc<JobQueue>,
    pub jobs: Arc<dyn JobStore>,
    pub files: Arc<dyn FileStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub commands: CommandBuilder,
    pub events: EventHandle,
    /// Capacity of the per-job progress channel.
    pub progress_buffer: usize,
}

/// Pool counters shared by all workers.
#[derive(Default)]
struct PoolStats {
    live: AtomicUsize,
    active: AtomicUsize,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub running: bool,
    pub workers: usize,
    pub live_workers: usize,
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub total_completed: u64,
    pub total_failed: u64,
}

/// Decrements a counter when dropped, including on task abort.
struct Counted<'a> {
    counter: &'a AtomicUsize,
    gauge: &'a prometheus::IntGauge,
}

impl<'a> Counted<'a> {
    fn enter(counter: &'a AtomicUsize, gauge: &'a prometheus::IntGauge) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        gauge.inc();
        Self { counter, gauge }
    }
}

impl Drop for Counted<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.gauge.dec();
    }
}

/// Fixed-size pool of workers.
///
/// Each worker takes the highest-priority job, owns it exclusively until a
/// terminal status is persisted, then goes back to the queue. Errors and
/// panics inside a job are turned into a FAILED job; they never end a worker.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    stats: Arc<PoolStats>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Mutex<JoinSet<()>>,
}

impl WorkerPool {
    /// Spawns `config.max_concurrent_jobs` workers.
    pub fn start(config: WorkerConfig, deps: WorkerDeps) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let stats = Arc::new(PoolStats::default());
        let deps = Arc::new(deps);
        let workers = config.max_concurrent_jobs.max(1);

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            set.spawn(worker_loop(
                worker_id,
                Arc::clone(&deps),
                Arc::clone(&stats),
                shutdown_tx.subscribe(),
            ));
        }

        info!(workers, "Worker pool started");

        Self {
            config,
            queue: Arc::clone(&deps.queue),
            stats,
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            workers: Mutex::new(set),
        }
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            running: self.running.load(Ordering::Relaxed),
            workers: self.config.max_concurrent_jobs.max(1),
            live_workers: self.stats.live.load(Ordering::SeqCst),
            active_jobs: self.stats.active.load(Ordering::SeqCst),
            queued_jobs: self.queue.len(),
            total_completed: self.stats.total_completed.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Stops taking new jobs and waits up to `grace` for in-flight ones.
    ///
    /// Workers still busy after `grace` are aborted; dropping their supervisor
    /// kills the child process and the job stays PROCESSING in the store until
    /// the next startup recovery.
    pub async fn shutdown(&self, grace: Duration) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker pool not running");
            return;
        }

        info!(grace_secs = grace.as_secs(), "Stopping worker pool");
        let _ = self.shutdown_tx.send(());

        let mut set = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Worker task ended abnormally");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = set.len(), "Workers still busy after grace period, aborting");
            set.shutdown().await;
        }

        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    deps: Arc<WorkerDeps>,
    stats: Arc<PoolStats>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let _live = Counted::enter(&stats.live, &metrics::LIVE_WORKERS);
    debug!(worker_id, "Worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            job = deps.queue.take_next() => job,
        };

        let _active = Counted::enter(&stats.active, &metrics::ACTIVE_JOBS);
        let status = run_guarded(worker_id, &deps, job).await;

        match status {
            JobStatus::Completed => {
                stats.total_completed.fetch_add(1, Ordering::Relaxed);
            }
            JobStatus::Failed => {
                stats.total_failed.fetch_add(1, Ordering::Relaxed);
            }
            other => warn!(worker_id, status = %other, "Job left worker in non-terminal status"),
        }
    }

    debug!(worker_id, "Worker stopped");
}

/// Runs one job, converting any error or panic into a FAILED job.
async fn run_guarded(worker_id: usize, deps: &WorkerDeps, mut job: Job) -> JobStatus {
    let result = AssertUnwindSafe(run_job(worker_id, deps, &mut job))
        .catch_unwind()
        .await;

    let message = match result {
        Ok(Ok(())) => return job.status,
        Ok(Err(e)) => e.to_string(),
        Err(panic) => format!("Worker panicked: {}", panic_message(panic.as_ref())),
    };

    error!(worker_id, job_id = %job.id, error = %message, "Job run aborted");
    fail_after_error(deps, &mut job, message);
    job.status
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Drives a job from QUEUED to a persisted terminal status.
async fn run_job(worker_id: usize, deps: &WorkerDeps, job: &mut Job) -> Result<(), WorkerError> {
    job.start()?;
    deps.jobs.save(job)?;
    info!(worker_id, job_id = %job.id, priority = %job.priority, "Job started");
    deps.events.try_emit(JobEvent::JobStarted {
        job_id: job.id.clone(),
        worker_id,
    });

    let files = deps.files.resolve(job).await?;
    job.output_path = Some(files.output_path.to_string_lossy().to_string());

    let command = deps
        .commands
        .build(&files.input_path, &files.output_path, &job.settings);
    if command.effective_video_codec != job.settings.video_codec {
        info!(
            job_id = %job.id,
            requested = %job.settings.video_codec,
            effective = %command.effective_video_codec,
            "Using hardware encoder"
        );
    }

    let input = InputDescriptor {
        job_id: job.id.clone(),
        duration_secs: files.duration_secs,
    };
    let (progress_tx, progress_rx) = mpsc::channel(deps.progress_buffer.max(1));

    let started = Instant::now();
    let (outcome, ()) = tokio::join!(
        deps.transcoder.execute(&command, &input, progress_tx),
        apply_progress(deps.jobs.as_ref(), job, progress_rx),
    );
    let result_label = if outcome.success { "success" } else { "failure" };
    metrics::TRANSCODE_DURATION
        .with_label_values(&[result_label])
        .observe(started.elapsed().as_secs_f64());

    // The terminal status only sticks once it is stored; on a failed write
    // the job is still PROCESSING and gets failed with the store error.
    let mut finished = job.clone();
    match TranscodeError::from_outcome(&command.program, &outcome) {
        None => finished.complete()?,
        Some(err) => finished.fail(err.to_string())?,
    }
    deps.jobs.save(&finished)?;
    *job = finished;
    publish_terminal(deps, job);
    Ok(())
}

/// Applies progress updates until the transcoder drops its sender.
///
/// Progress writes are best-effort.
async fn apply_progress(
    jobs: &dyn JobStore,
    job: &mut Job,
    mut progress_rx: mpsc::Receiver<ProgressUpdate>,
) {
    while let Some(update) = progress_rx.recv().await {
        if !job.record_progress(update.percentage, update.estimated_total()) {
            continue;
        }
        if let Err(e) = jobs.save(job) {
            warn!(job_id = %job.id, error = %e, "Failed to persist progress");
        }
    }
}

/// Moves a job whose run was aborted to FAILED and persists it.
fn fail_after_error(deps: &WorkerDeps, job: &mut Job, message: String) {
    if job.status == JobStatus::Queued {
        if let Err(e) = job.start() {
            error!(job_id = %job.id, error = %e, "Cannot start job for failure");
        }
    }
    if job.status == JobStatus::Processing {
        if let Err(e) = job.fail(message) {
            error!(job_id = %job.id, error = %e, "Cannot fail job");
        }
    }

    if let Err(e) = deps.jobs.save(job) {
        error!(job_id = %job.id, error = %e, "Failed to persist failed job");
    }
    publish_terminal(deps, job);
}

fn publish_terminal(deps: &WorkerDeps, job: &Job) {
    let event = match job.status {
        JobStatus::Completed => {
            info!(job_id = %job.id, duration_secs = ?job.actual_duration_secs, "Job completed");
            JobEvent::JobCompleted {
                job_id: job.id.clone(),
                duration_secs: job.actual_duration_secs,
            }
        }
        JobStatus::Failed => {
            let error = job.error_message.clone().unwrap_or_default();
            warn!(job_id = %job.id, error = %error, "Job failed");
            JobEvent::JobFailed {
                job_id: job.id.clone(),
                error,
            }
        }
        _ => return,
    };
    metrics::JOBS_FINISHED
        .with_label_values(&[job.status.as_str()])
        .inc();
    deps.events.try_emit(event);
}
