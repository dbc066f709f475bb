use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{Job, JobError, JobStatus, Priority, ProcessingMode, QualityPreset};
use crate::media::MediaError;
use crate::transcoder::ToolchainInfo;

/// Errors surfaced at the submission/query boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Cannot cancel job {job_id}: job is {status}")]
    Conflict { job_id: String, status: JobStatus },

    #[error("Storage unavailable: {0}")]
    Persistence(String),
}

impl From<JobError> for ServiceError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound(id) => Self::NotFound(format!("Job not found: {}", id)),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<MediaError> for ServiceError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::NotFound(id) => Self::NotFound(format!("Media file not found: {}", id)),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// A job submission. Omitted settings take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateJobRequest {
    pub input_file_id: String,
    #[serde(default)]
    pub output_filename: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub video_codec: Option<String>,
    #[serde(default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub video_bitrate: Option<String>,
    #[serde(default)]
    pub audio_bitrate: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub frame_rate: Option<u32>,
    #[serde(default)]
    pub processing_mode: Option<ProcessingMode>,
    #[serde(default)]
    pub quality_preset: Option<QualityPreset>,
    #[serde(default)]
    pub threads: Option<u32>,
}

/// Registers a file already present on the engine's filesystem.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterMediaRequest {
    pub path: String,
}

/// One page of jobs, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
}

/// Result of startup recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// QUEUED jobs put back on the queue.
    pub requeued: usize,
    /// PROCESSING jobs marked FAILED.
    pub interrupted: usize,
}

/// Host and toolchain summary.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub version: String,
    pub cpu_count: usize,
    pub workers: usize,
    pub gpu_available: bool,
    pub toolchain: ToolchainInfo,
}
