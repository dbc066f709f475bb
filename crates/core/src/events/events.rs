use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobStatus, Priority, ProcessingMode};

/// Engine lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Job lifecycle
    JobCreated {
        job_id: String,
        owner_id: String,
        input_file_id: String,
        priority: Priority,
        processing_mode: ProcessingMode,
    },
    JobStarted {
        job_id: String,
        worker_id: usize,
    },
    JobCompleted {
        job_id: String,
        duration_secs: Option<u64>,
    },
    JobFailed {
        job_id: String,
        error: String,
    },
    JobCancelled {
        job_id: String,
        cancelled_by: String,
    },
}

impl JobEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::JobCreated { .. } => "job_created",
            Self::JobStarted { .. } => "job_started",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::JobCancelled { .. } => "job_cancelled",
        }
    }

    /// The event recorded when a job enters `status`.
    pub fn type_for_status(status: JobStatus) -> &'static str {
        match status {
            JobStatus::Queued => "job_created",
            JobStatus::Processing => "job_started",
            JobStatus::Completed => "job_completed",
            JobStatus::Failed => "job_failed",
            JobStatus::Cancelled => "job_cancelled",
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::JobCreated { job_id, .. }
            | Self::JobStarted { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. }
            | Self::JobCancelled { job_id, .. } => Some(job_id),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }

    /// The user on whose behalf the event happened, when known.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::JobCreated { owner_id, .. } => Some(owner_id),
            Self::JobCancelled { cancelled_by, .. } => Some(cancelled_by),
            _ => None,
        }
    }
}

/// A persisted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub job_id: Option<String>,
    pub user_id: Option<String>,
    pub data: JobEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_metadata() {
        let event = JobEvent::JobCreated {
            job_id: "j-1".to_string(),
            owner_id: "alice".to_string(),
            input_file_id: "m-1".to_string(),
            priority: Priority::High,
            processing_mode: ProcessingMode::Gpu,
        };
        assert_eq!(event.event_type(), "job_created");
        assert_eq!(event.job_id(), Some("j-1"));
        assert_eq!(event.user_id(), Some("alice"));

        let stopped = JobEvent::ServiceStopped {
            reason: "shutdown".to_string(),
        };
        assert_eq!(stopped.job_id(), None);
        assert_eq!(stopped.user_id(), None);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let event = JobEvent::JobFailed {
            job_id: "j-1".to_string(),
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"job_failed\""));

        let parsed: JobEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
