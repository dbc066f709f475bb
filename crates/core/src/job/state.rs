//! Job status transitions.
//!
//! ```text
//! Queued ──► Processing ──► Completed
//!   │             └───────► Failed
//!   └──► Cancelled
//! ```
//!
//! Submission, cancellation and the worker pool all go through these methods;
//! nothing else assigns `Job::status`.

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;

use super::types::{Job, JobStatus};

/// Message recorded when a failure reason is unavailable.
const DEFAULT_FAILURE_MESSAGE: &str = "Transcoding failed";

/// An illegal status transition was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id}: cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

impl JobStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, JobStatus::Processing)
                | (Self::Queued, JobStatus::Cancelled)
                | (Self::Processing, JobStatus::Completed)
                | (Self::Processing, JobStatus::Failed)
        )
    }
}

impl Job {
    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                job_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Queued -> Processing. Stamps `started_at`.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// Queued -> Cancelled.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Cancelled)
    }

    /// Processing -> Completed. Progress is pinned to 100.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.progress_percentage = 100;
        self.error_message = None;
        self.finish();
        Ok(())
    }

    /// Processing -> Failed with a non-empty error message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        let message = message.into();
        self.error_message = Some(if message.trim().is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            message
        });
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        let now = self.updated_at;
        self.completed_at = Some(now);
        self.actual_duration_secs = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0) as u64);
    }

    /// Applies a progress sample while processing.
    ///
    /// Progress never goes backwards; returns true if the stored percentage
    /// changed.
    pub fn record_progress(&mut self, percentage: u8, estimated_total: Option<Duration>) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        if let Some(total) = estimated_total {
            self.estimated_duration_secs = Some(total.as_secs());
        }
        let percentage = percentage.min(100);
        if percentage <= self.progress_percentage {
            return false;
        }
        self.progress_percentage = percentage;
        self.updated_at = Utc::now();
        true
    }
}
