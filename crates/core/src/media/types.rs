use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcoder::MediaInfo;

/// A registered input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub owner_id: String,
    pub path: String,
    /// Denominator for progress percentage; 0 when ffprobe could not tell.
    pub duration_secs: f64,
    pub format: String,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl MediaFile {
    /// Builds a record from probe results with a fresh id.
    pub fn from_probe(owner_id: impl Into<String>, info: MediaInfo) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            path: info.path.to_string_lossy().to_string(),
            duration_secs: info.duration_secs,
            format: info.format,
            video_codec: info.video_codec,
            audio_codec: info.audio_codec,
            width: info.width,
            height: info.height,
            frame_rate: info.frame_rate,
            size_bytes: info.size_bytes,
            created_at: Utc::now(),
        }
    }

    /// `WxH` of the video stream, when known.
    pub fn resolution(&self) -> Option<String> {
        Some(format!("{}x{}", self.width?, self.height?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_probe() {
        let info = MediaInfo {
            path: PathBuf::from("/media/in.mkv"),
            size_bytes: 1000,
            duration_secs: 42.0,
            format: "matroska".to_string(),
            video_codec: Some("h264".to_string()),
            audio_codec: None,
            width: Some(640),
            height: Some(360),
            frame_rate: Some(25.0),
        };
        let media = MediaFile::from_probe("alice", info);
        assert_eq!(media.owner_id, "alice");
        assert_eq!(media.path, "/media/in.mkv");
        assert_eq!(media.duration_secs, 42.0);
        assert_eq!(media.resolution().as_deref(), Some("640x360"));
        assert!(!media.id.is_empty());
    }
}
