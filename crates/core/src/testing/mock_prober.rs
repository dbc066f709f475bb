//! Mock media prober for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::transcoder::{MediaInfo, MediaProber, TranscodeError};

/// Mock implementation of the MediaProber trait.
///
/// Unknown paths get a 60 second h264/aac clip unless a default is set.
#[derive(Debug, Default)]
pub struct MockProber {
    results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    next_error: Arc<RwLock<Option<TranscodeError>>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Configure the next probe to fail with the given error.
    pub async fn set_next_error(&self, error: TranscodeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Default clip info used for unknown paths.
    pub fn clip(path: &Path, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: path.to_path_buf(),
            size_bytes: 10 * 1024 * 1024,
            duration_secs,
            format: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            audio_codec: Some("aac".to_string()),
            width: Some(1920),
            height: Some(1080),
            frame_rate: Some(30.0),
        }
    }
}

#[async_trait]
impl MediaProber for MockProber {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self
            .results
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_else(|| Self::clip(path, 60.0)))
    }
}
