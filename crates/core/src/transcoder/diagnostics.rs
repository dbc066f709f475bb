//! Classification of ffmpeg's stderr lines.

/// Severity assigned to a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Build banner and stream layout chatter.
    Banner,
    Error,
    Warn,
    Trace,
}

const BANNER_MARKERS: &[&str] = &[
    "Configuration:",
    "configuration:",
    "built with",
    "Stream #",
    "Input #",
    "Output #",
];

impl DiagnosticLevel {
    /// Classifies a stderr line by keyword.
    pub fn classify(line: &str) -> Self {
        if BANNER_MARKERS.iter().any(|m| line.contains(m)) {
            return Self::Banner;
        }
        let lower = line.to_ascii_lowercase();
        if lower.contains("error") {
            Self::Error
        } else if lower.contains("warning") {
            Self::Warn
        } else {
            Self::Trace
        }
    }

    /// Whether lines at this level belong in a job's failure message.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Error | Self::Warn)
    }

    /// Routes a line to the matching tracing level.
    pub fn log(&self, job_id: &str, line: &str) {
        match self {
            Self::Banner => tracing::debug!(job_id = %job_id, "ffmpeg: {}", line),
            Self::Error => tracing::error!(job_id = %job_id, "ffmpeg error: {}", line),
            Self::Warn => tracing::warn!(job_id = %job_id, "ffmpeg warning: {}", line),
            Self::Trace => tracing::trace!(job_id = %job_id, "ffmpeg: {}", line),
        }
    }
}
