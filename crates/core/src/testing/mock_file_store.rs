//! In-memory file store for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::job::Job;
use crate::media::{FileStore, FileStoreError, ResolvedFiles};

/// Resolves every job to `/mock/input/<input_file_id>` and
/// `/mock/output/<output_filename>` without touching the filesystem.
#[derive(Debug)]
pub struct MockFileStore {
    duration_secs: Arc<RwLock<f64>>,
    next_error: Arc<RwLock<Option<FileStoreError>>>,
}

impl Default for MockFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileStore {
    pub fn new() -> Self {
        Self {
            duration_secs: Arc::new(RwLock::new(60.0)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_duration(&self, secs: f64) {
        *self.duration_secs.write().await = secs;
    }

    pub async fn set_next_error(&self, error: FileStoreError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn resolve(&self, job: &Job) -> Result<ResolvedFiles, FileStoreError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(ResolvedFiles {
            input_path: PathBuf::from("/mock/input").join(&job.input_file_id),
            output_path: PathBuf::from("/mock/output").join(&job.output_filename),
            duration_secs: *self.duration_secs.read().await,
        })
    }
}
