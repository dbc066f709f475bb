//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

use super::supervisor::Outcome;

/// Errors raised while running the external tools.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The tool could not be started (missing or not executable).
    #[error("Failed to start {program}: {reason}")]
    ToolSpawn { program: PathBuf, reason: String },

    /// The tool ran and exited unsuccessfully.
    #[error("{}", execution_message(.exit_code, .diagnostics))]
    ToolExecution {
        exit_code: i32,
        diagnostics: Vec<String>,
    },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// ffprobe failed or produced unusable output.
    #[error("Failed to probe media file: {reason}")]
    Probe { reason: String },
}

fn execution_message(exit_code: &i32, diagnostics: &[String]) -> String {
    if diagnostics.is_empty() {
        format!("Transcoding failed with exit code {}", exit_code)
    } else {
        format!(
            "Transcoding failed with exit code {}: {}",
            exit_code,
            diagnostics.join("; ")
        )
    }
}

impl TranscodeError {
    pub fn probe(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
        }
    }

    /// Converts a failed outcome into the matching error.
    ///
    /// Returns `None` for successful outcomes.
    pub fn from_outcome(program: &std::path::Path, outcome: &Outcome) -> Option<Self> {
        if outcome.success {
            return None;
        }
        if outcome.exit_code == Outcome::SPAWN_FAILED {
            return Some(Self::ToolSpawn {
                program: program.to_path_buf(),
                reason: outcome
                    .diagnostics
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Some(Self::ToolExecution {
            exit_code: outcome.exit_code,
            diagnostics: outcome.diagnostics.clone(),
        })
    }
}
