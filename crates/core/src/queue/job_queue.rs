//! Priority queue of jobs waiting for a worker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;

use crate::job::{Job, JobStatus, Priority};
use crate::metrics;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job {job_id} is {status}, only queued jobs can be enqueued")]
    NotQueued { job_id: String, status: JobStatus },

    #[error("job {0} is already queued")]
    Duplicate(String),
}

/// Dequeue order: priority rank, then creation time, then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rank: u8,
    created_at: DateTime<Utc>,
    seq: u64,
}

/// A queued job as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedEntry {
    pub job_id: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<QueueKey, Job>,
    index: HashMap<String, QueueKey>,
    next_seq: u64,
}

impl Inner {
    fn remove_key(&mut self, key: QueueKey) -> Option<Job> {
        let job = self.entries.remove(&key)?;
        self.index.remove(&job.id);
        Some(job)
    }
}

/// Jobs owned by the queue until a worker takes them.
///
/// Every mutation happens under one lock, so a job returned by a take is
/// gone before any other caller can observe or remove it.
#[derive(Default)]
pub struct JobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No invariant spans an unwind point inside the critical sections.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a queued job and wakes one waiting worker.
    pub fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        if job.status != JobStatus::Queued {
            return Err(QueueError::NotQueued {
                job_id: job.id,
                status: job.status,
            });
        }

        let depth = {
            let mut inner = self.lock();
            if inner.index.contains_key(&job.id) {
                return Err(QueueError::Duplicate(job.id));
            }
            let key = QueueKey {
                rank: job.priority.rank(),
                created_at: job.created_at,
                seq: inner.next_seq,
            };
            inner.next_seq += 1;
            inner.index.insert(job.id.clone(), key);
            inner.entries.insert(key, job);
            inner.entries.len()
        };

        metrics::QUEUE_DEPTH.set(depth as i64);
        self.notify.notify_one();
        Ok(())
    }

    /// Removes and returns the highest-priority job, if any.
    pub fn try_take_next(&self) -> Option<Job> {
        let (job, remaining) = {
            let mut inner = self.lock();
            let key = *inner.entries.keys().next()?;
            let job = inner.remove_key(key)?;
            (job, inner.entries.len())
        };

        metrics::QUEUE_DEPTH.set(remaining as i64);
        if remaining > 0 {
            // Pass the wakeup on so other idle workers see the rest.
            self.notify.notify_one();
        }
        Some(job)
    }

    /// Waits for and removes the highest-priority job.
    ///
    /// Cancel safe: dropping the future never loses a job.
    pub async fn take_next(&self) -> Job {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.try_take_next() {
                return job;
            }
            notified.await;
        }
    }

    /// Removes a job by id; `None` if it is not (or no longer) queued.
    pub fn remove(&self, job_id: &str) -> Option<Job> {
        let (job, remaining) = {
            let mut inner = self.lock();
            let key = inner.index.get(job_id).copied()?;
            let job = inner.remove_key(key)?;
            (job, inner.entries.len())
        };
        metrics::QUEUE_DEPTH.set(remaining as i64);
        Some(job)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.lock().index.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued jobs in dequeue order.
    pub fn snapshot(&self) -> Vec<QueuedEntry> {
        self.lock()
            .entries
            .values()
            .map(|job| QueuedEntry {
                job_id: job.id.clone(),
                priority: job.priority,
                created_at: job.created_at,
            })
            .collect()
    }
}
