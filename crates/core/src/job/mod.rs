//! Transcoding jobs: domain types, status transitions and persistence.

mod sqlite_store;
mod state;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use state::TransitionError;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{Job, JobStatus, OutputSettings, Priority, ProcessingMode, QualityPreset};
