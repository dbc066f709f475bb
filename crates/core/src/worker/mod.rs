//! Fixed-size pool of workers draining the job queue.

mod config;
mod pool;

pub use config::WorkerConfig;
pub use pool::{PoolStatus, WorkerDeps, WorkerError, WorkerPool};
