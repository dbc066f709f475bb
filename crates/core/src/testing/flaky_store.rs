//! Job store wrapper with injectable save failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::job::{Job, JobError, JobFilter, JobStatus, JobStore};

/// Wraps a real store and fails selected `save` calls.
///
/// Failures are armed per status: `fail_saves_with_status(Processing, 1)`
/// makes the next save of a processing job fail once.
pub struct FlakyJobStore {
    inner: Arc<dyn JobStore>,
    armed: Mutex<Vec<(JobStatus, usize)>>,
    injected: AtomicUsize,
}

impl FlakyJobStore {
    pub fn new(inner: Arc<dyn JobStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(Vec::new()),
            injected: AtomicUsize::new(0),
        }
    }

    pub fn fail_saves_with_status(&self, status: JobStatus, times: usize) {
        self.armed.lock().unwrap_or_else(|e| e.into_inner()).push((status, times));
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn should_fail(&self, job: &Job) -> bool {
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        match armed
            .iter_mut()
            .find(|(status, remaining)| *status == job.status && *remaining > 0)
        {
            Some((_, remaining)) => {
                *remaining -= 1;
                true
            }
            None => false,
        }
    }
}

impl JobStore for FlakyJobStore {
    fn save(&self, job: &Job) -> Result<(), JobError> {
        if self.should_fail(job) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(JobError::Database("injected failure".to_string()));
        }
        self.inner.save(job)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        self.inner.get(id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        self.inner.list(filter)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        self.inner.count(filter)
    }

    fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, JobError> {
        self.inner.list_by_status(status)
    }
}
