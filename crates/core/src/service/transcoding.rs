//! Submission and query facade over the job store and queue.
//!
//! Every status change made here goes through the job state machine and is
//! persisted before anything is published.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::{
    CreateJobRequest, JobPage, RecoveryReport, RegisterMediaRequest, ServiceError, SystemInfo,
};
use crate::events::{EventHandle, JobEvent};
use crate::job::{Job, JobFilter, JobStatus, JobStore, OutputSettings};
use crate::media::{MediaFile, MediaStore};
use crate::metrics;
use crate::queue::JobQueue;
use crate::transcoder::{MediaProber, ToolchainInfo, TranscoderConfig};

/// Error message for jobs found PROCESSING at startup.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by service restart";

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

static RESOLUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9]\d*x[1-9]\d*$").unwrap());

/// Collaborators of [`TranscodingService`].
#[derive(Clone)]
pub struct ServiceDeps {
    pub jobs: Arc<dyn JobStore>,
    pub media: Arc<dyn MediaStore>,
    pub prober: Arc<dyn MediaProber>,
    pub queue: Arc<JobQueue>,
    pub events: EventHandle,
    pub transcoder: TranscoderConfig,
    /// Size of the worker pool, reported by `system_info`.
    pub workers: usize,
}

pub struct TranscodingService {
    deps: ServiceDeps,
}

impl TranscodingService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.deps.queue
    }

    /// Validates, persists and enqueues a new job.
    pub fn create_job(&self, owner_id: &str, request: CreateJobRequest) -> Result<Job, ServiceError> {
        let input_file_id = request.input_file_id.trim();
        if input_file_id.is_empty() {
            return Err(ServiceError::Validation(
                "input_file_id is required".to_string(),
            ));
        }

        let media = self
            .deps
            .media
            .get(input_file_id)?
            .filter(|m| m.owner_id == owner_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Media file not found: {}", input_file_id))
            })?;

        let output_filename = request.output_filename.clone();
        let priority = request.priority.unwrap_or_default();
        let settings = settings_from_request(request)?;
        if let Some(name) = &output_filename {
            validate_filename(name)?;
        }

        let job = Job::new(owner_id, media.id, output_filename, settings, priority);
        self.deps.jobs.save(&job)?;
        if let Err(e) = self.deps.queue.enqueue(job.clone()) {
            error!(job_id = %job.id, error = %e, "Persisted job could not be enqueued");
            return Err(ServiceError::Persistence(e.to_string()));
        }

        metrics::JOBS_SUBMITTED
            .with_label_values(&[job.priority.as_str()])
            .inc();
        info!(
            job_id = %job.id,
            owner_id = %job.owner_id,
            priority = %job.priority,
            "Job submitted"
        );
        self.deps.events.try_emit(JobEvent::JobCreated {
            job_id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            input_file_id: job.input_file_id.clone(),
            priority: job.priority,
            processing_mode: job.settings.processing_mode,
        });

        Ok(job)
    }

    /// Gets a job. With an owner, jobs of other owners are reported missing.
    pub fn get_job(&self, id: &str, owner_id: Option<&str>) -> Result<Job, ServiceError> {
        self.deps
            .jobs
            .get(id)?
            .filter(|job| owner_id.map_or(true, |owner| job.owner_id == owner))
            .ok_or_else(|| ServiceError::NotFound(format!("Job not found: {}", id)))
    }

    /// Lists jobs newest first. `page` is zero-based.
    pub fn list_jobs(
        &self,
        owner_id: Option<&str>,
        status: Option<JobStatus>,
        page: u32,
        size: Option<u32>,
    ) -> Result<JobPage, ServiceError> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let mut filter = JobFilter::new()
            .with_limit(i64::from(size))
            .with_offset(i64::from(page) * i64::from(size));
        if let Some(owner) = owner_id {
            filter = filter.with_owner(owner);
        }
        if let Some(status) = status {
            filter = filter.with_status(status);
        }

        let jobs = self.deps.jobs.list(&filter)?;
        let total = self.deps.jobs.count(&filter)?;
        Ok(JobPage {
            jobs,
            total,
            page,
            size,
        })
    }

    /// Cancels a job that is still waiting in the queue.
    ///
    /// Removal from the queue decides the race with workers: once a worker
    /// has taken the job, cancellation is refused.
    pub fn cancel_job(&self, id: &str, owner_id: Option<&str>) -> Result<Job, ServiceError> {
        let stored = self.get_job(id, owner_id)?;

        let Some(mut job) = self.deps.queue.remove(id) else {
            // Still QUEUED in the store means a worker took it and has not
            // written PROCESSING yet.
            let status = match stored.status {
                JobStatus::Queued => JobStatus::Processing,
                other => other,
            };
            return Err(ServiceError::Conflict {
                job_id: id.to_string(),
                status,
            });
        };

        let original = job.clone();
        if let Err(e) = job.cancel() {
            // The queue only holds QUEUED jobs.
            error!(job_id = %id, error = %e, "Queued job refused cancellation");
            return Err(ServiceError::Conflict {
                job_id: id.to_string(),
                status: job.status,
            });
        }

        if let Err(e) = self.deps.jobs.save(&job) {
            warn!(job_id = %id, error = %e, "Failed to persist cancellation, requeueing");
            if let Err(requeue) = self.deps.queue.enqueue(original) {
                error!(job_id = %id, error = %requeue, "Failed to requeue job");
            }
            return Err(e.into());
        }

        metrics::JOBS_FINISHED
            .with_label_values(&[JobStatus::Cancelled.as_str()])
            .inc();
        info!(job_id = %id, "Job cancelled");
        self.deps.events.try_emit(JobEvent::JobCancelled {
            job_id: job.id.clone(),
            cancelled_by: owner_id.unwrap_or(&job.owner_id).to_string(),
        });

        Ok(job)
    }

    /// Restores queue state after a restart.
    ///
    /// QUEUED jobs go back on the queue; PROCESSING jobs were cut off mid-run
    /// and are failed rather than redelivered.
    pub fn recover_queued(&self) -> Result<RecoveryReport, ServiceError> {
        let mut report = RecoveryReport::default();

        for job in self.deps.jobs.list_by_status(JobStatus::Queued)? {
            let job_id = job.id.clone();
            match self.deps.queue.enqueue(job) {
                Ok(()) => report.requeued += 1,
                Err(e) => debug!(job_id = %job_id, error = %e, "Skipping recovered job"),
            }
        }

        for mut job in self.deps.jobs.list_by_status(JobStatus::Processing)? {
            if let Err(e) = job.fail(INTERRUPTED_MESSAGE) {
                warn!(job_id = %job.id, error = %e, "Cannot fail interrupted job");
                continue;
            }
            self.deps.jobs.save(&job)?;
            report.interrupted += 1;
            self.deps.events.try_emit(JobEvent::JobFailed {
                job_id: job.id.clone(),
                error: INTERRUPTED_MESSAGE.to_string(),
            });
        }

        if report.requeued > 0 || report.interrupted > 0 {
            info!(
                requeued = report.requeued,
                interrupted = report.interrupted,
                "Recovered jobs from previous run"
            );
        }
        Ok(report)
    }

    /// Probes a local file and records it as an input for jobs.
    pub async fn register_media(
        &self,
        owner_id: &str,
        request: RegisterMediaRequest,
    ) -> Result<MediaFile, ServiceError> {
        let path = request.path.trim();
        if path.is_empty() {
            return Err(ServiceError::Validation("path is required".to_string()));
        }

        let info = self
            .deps
            .prober
            .probe(Path::new(path))
            .await
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let media = MediaFile::from_probe(owner_id, info);
        self.deps.media.register(&media)?;
        info!(
            media_id = %media.id,
            path = %media.path,
            duration_secs = media.duration_secs,
            "Media registered"
        );
        Ok(media)
    }

    pub fn get_media(&self, id: &str, owner_id: Option<&str>) -> Result<MediaFile, ServiceError> {
        self.deps
            .media
            .get(id)?
            .filter(|m| owner_id.map_or(true, |owner| m.owner_id == owner))
            .ok_or_else(|| ServiceError::NotFound(format!("Media file not found: {}", id)))
    }

    pub async fn system_info(&self) -> SystemInfo {
        let toolchain = ToolchainInfo::detect(&self.deps.transcoder).await;
        SystemInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            workers: self.deps.workers,
            gpu_available: toolchain.gpu_available(),
            toolchain,
        }
    }
}

fn settings_from_request(request: CreateJobRequest) -> Result<OutputSettings, ServiceError> {
    let defaults = OutputSettings::default();

    let non_empty = |field: &str, value: Option<String>, default: String| match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Err(ServiceError::Validation(format!(
            "{} must not be empty",
            field
        ))),
        Some(v) => Ok(v.trim().to_string()),
    };

    if let Some(resolution) = &request.resolution {
        if !RESOLUTION.is_match(resolution) {
            return Err(ServiceError::Validation(format!(
                "resolution must look like 1280x720, got {:?}",
                resolution
            )));
        }
    }
    if request.frame_rate == Some(0) {
        return Err(ServiceError::Validation(
            "frame_rate must be positive".to_string(),
        ));
    }
    if request.threads == Some(0) {
        return Err(ServiceError::Validation(
            "threads must be positive".to_string(),
        ));
    }

    Ok(OutputSettings {
        video_codec: non_empty("video_codec", request.video_codec, defaults.video_codec)?,
        audio_codec: non_empty("audio_codec", request.audio_codec, defaults.audio_codec)?,
        output_format: non_empty("output_format", request.output_format, defaults.output_format)?,
        video_bitrate: non_empty("video_bitrate", request.video_bitrate, defaults.video_bitrate)?,
        audio_bitrate: non_empty("audio_bitrate", request.audio_bitrate, defaults.audio_bitrate)?,
        resolution: request.resolution,
        frame_rate: request.frame_rate,
        processing_mode: request.processing_mode.unwrap_or_default(),
        quality_preset: request.quality_preset.unwrap_or_default(),
        threads: request.threads,
    })
}

fn validate_filename(name: &str) -> Result<(), ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(ServiceError::Validation(
            "output_filename must not be empty".to_string(),
        ));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(ServiceError::Validation(
            "output_filename must not contain path separators".to_string(),
        ));
    }
    Ok(())
}
