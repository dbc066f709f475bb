use thiserror::Error;

use super::types::MediaFile;

/// Error type for media storage operations.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media file not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for media record storage backends.
pub trait MediaStore: Send + Sync {
    /// Persist a new media record.
    fn register(&self, media: &MediaFile) -> Result<(), MediaError>;

    /// Get a media record by ID.
    fn get(&self, id: &str) -> Result<Option<MediaFile>, MediaError>;
}
