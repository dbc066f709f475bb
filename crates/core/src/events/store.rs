use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{EventRecord, JobEvent};
use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Which slice of the job history a query reads.
///
/// Event types accumulate: each `with_transition` or `outcomes_only` call
/// widens the set, and an empty set matches every type.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub job_id: Option<String>,
    /// Events written on behalf of this user (job creation, cancellation).
    pub actor: Option<String>,
    pub event_types: Vec<&'static str>,
    /// Drop service start/stop records.
    pub jobs_only: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    /// The timeline of one job.
    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            jobs_only: true,
            ..Self::new()
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Events that moved a job into `status`.
    pub fn with_transition(mut self, status: JobStatus) -> Self {
        self.push_type(JobEvent::type_for_status(status));
        self.jobs_only = true;
        self
    }

    /// Completed, failed and cancelled events only.
    pub fn outcomes_only(mut self) -> Self {
        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            self = self.with_transition(status);
        }
        self
    }

    pub fn jobs_only(mut self) -> Self {
        self.jobs_only = true;
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    fn push_type(&mut self, event_type: &'static str) {
        if !self.event_types.contains(&event_type) {
            self.event_types.push(event_type);
        }
    }
}

pub trait EventStore: Send + Sync {
    /// Returns the assigned row id.
    fn insert(&self, record: &EventRecord) -> Result<i64, EventError>;

    /// Newest first
    fn query(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, EventError>;

    /// Ignores the filter's page.
    fn count(&self, filter: &EventFilter) -> Result<i64, EventError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_only_selects_terminal_types() {
        let filter = EventFilter::new().outcomes_only();
        assert_eq!(
            filter.event_types,
            vec!["job_completed", "job_failed", "job_cancelled"]
        );
        assert!(filter.jobs_only);
    }

    #[test]
    fn test_transitions_accumulate_without_duplicates() {
        let filter = EventFilter::for_job("j-1")
            .with_transition(JobStatus::Processing)
            .with_transition(JobStatus::Failed)
            .with_transition(JobStatus::Processing);
        assert_eq!(filter.event_types, vec!["job_started", "job_failed"]);
        assert_eq!(filter.job_id.as_deref(), Some("j-1"));
        assert_eq!(filter.limit, 100);
    }
}
