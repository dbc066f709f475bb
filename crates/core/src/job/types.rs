//! Types for transcode jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheduling priority of a job.
///
/// Total order: `Urgent > High > Normal > Low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[serde(alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "NORMAL")]
    Normal,
    #[serde(alias = "HIGH")]
    High,
    #[serde(alias = "URGENT")]
    Urgent,
}

impl Priority {
    /// Queue rank: lower ranks dequeue first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Urgent => 1,
            Self::High => 2,
            Self::Normal => 3,
            Self::Low => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Lifecycle status of a job. See `state.rs` for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Where encoding runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    #[default]
    #[serde(alias = "CPU")]
    Cpu,
    #[serde(alias = "GPU")]
    Gpu,
}

/// Software encoder speed/quality preset (x264/x265 only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Ultrafast,
    Fast,
    #[default]
    Medium,
    Slow,
    Veryslow,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Veryslow => "veryslow",
        }
    }
}

/// Requested output encoding.
///
/// This is what the caller asked for. Any hardware codec substitution happens
/// when the command is built and never flows back into a persisted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// Target size as `WIDTHxHEIGHT`. None keeps the source size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Target frames per second. None keeps the source rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(default)]
    pub processing_mode: ProcessingMode,
    #[serde(default)]
    pub quality_preset: QualityPreset,
    /// Encoder thread count, CPU mode only. None lets the tool decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_output_format() -> String {
    "mp4".to_string()
}

fn default_video_bitrate() -> String {
    "1500k".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            output_format: default_output_format(),
            video_bitrate: default_video_bitrate(),
            audio_bitrate: default_audio_bitrate(),
            resolution: None,
            frame_rate: None,
            processing_mode: ProcessingMode::Cpu,
            quality_preset: QualityPreset::Medium,
            threads: None,
        }
    }
}

/// A single transcode request and its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Owning user (external identity).
    pub owner_id: String,
    /// Registered input media (see `media::MediaFile`).
    pub input_file_id: String,
    pub output_filename: String,
    /// Resolved output location, set once a worker picks the job up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub settings: OutputSettings,
    pub priority: Priority,
    pub status: JobStatus,
    pub progress_percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock estimate for the whole encode, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
    /// Wall-clock time from start to terminal status, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_secs: Option<u64>,
}

impl Job {
    /// Creates a new job in the `Queued` state.
    pub fn new(
        owner_id: impl Into<String>,
        input_file_id: impl Into<String>,
        output_filename: Option<String>,
        settings: OutputSettings,
        priority: Priority,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let output_filename = output_filename
            .unwrap_or_else(|| format!("{}.{}", uuid::Uuid::new_v4(), settings.output_format));
        let now = Utc::now();

        Self {
            id,
            owner_id: owner_id.into(),
            input_file_id: input_file_id.into(),
            output_filename,
            output_path: None,
            settings,
            priority,
            status: JobStatus::Queued,
            progress_percentage: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            estimated_duration_secs: None,
            actual_duration_secs: None,
        }
    }
}
