//! Resolution of job inputs and outputs to local paths.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::store::{MediaError, MediaStore};
use crate::job::Job;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("Input media not found: {0}")]
    MediaNotFound(String),

    #[error("Input file missing on disk: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Failed to prepare output directory {}: {reason}", .path.display())]
    OutputDirectory { path: PathBuf, reason: String },

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Local paths for one job run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFiles {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub duration_secs: f64,
}

/// Resolves a job's input reference and output location.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn resolve(&self, job: &Job) -> Result<ResolvedFiles, FileStoreError>;
}

/// Reads inputs where they were registered and writes outputs under one directory.
pub struct LocalFileStore {
    media: Arc<dyn MediaStore>,
    output_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(media: Arc<dyn MediaStore>, output_dir: PathBuf) -> Self {
        Self { media, output_dir }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn resolve(&self, job: &Job) -> Result<ResolvedFiles, FileStoreError> {
        let media = self
            .media
            .get(&job.input_file_id)?
            .ok_or_else(|| FileStoreError::MediaNotFound(job.input_file_id.clone()))?;

        let input_path = PathBuf::from(&media.path);
        if !tokio::fs::try_exists(&input_path).await.unwrap_or(false) {
            return Err(FileStoreError::InputMissing(input_path));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| FileStoreError::OutputDirectory {
                path: self.output_dir.clone(),
                reason: e.to_string(),
            })?;

        Ok(ResolvedFiles {
            input_path,
            output_path: self.output_dir.join(&job.output_filename),
            duration_secs: media.duration_secs,
        })
    }
}
