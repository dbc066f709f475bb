//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ffmpeg-driven transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Directory transcoded outputs are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Bound on joining the stream drain tasks after the child exits.
    #[serde(default = "default_monitor_join_timeout")]
    pub monitor_join_timeout_secs: u64,

    /// Capacity of the per-job progress channel.
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,

    /// FFmpeg log level passed as `-loglevel` (quiet, error, warning, info, ...).
    #[serde(default)]
    pub ffmpeg_log_level: Option<String>,

    /// Additional output arguments appended before the progress sink.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_monitor_join_timeout() -> u64 {
    5
}

fn default_progress_buffer() -> usize {
    64
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            output_dir: default_output_dir(),
            monitor_join_timeout_secs: default_monitor_join_timeout(),
            progress_buffer: default_progress_buffer(),
            ffmpeg_log_level: None,
            extra_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Sets the drain-task join bound in seconds.
    pub fn with_monitor_join_timeout(mut self, secs: u64) -> Self {
        self.monitor_join_timeout_secs = secs;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.ffmpeg_log_level = Some(level.into());
        self
    }
}
