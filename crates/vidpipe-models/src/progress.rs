//! Progress frames relayed from workers to UI clients.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// One progress frame for a video, published on `progress:video:{id}`.
///
/// Delivery is at-most-once; frames are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProgressFrame {
    pub video_id: VideoId,
    /// Stage label ("transcode", "subtitle:en", "reel")
    pub stage: String,
    /// 0-100
    pub percent: u8,
    /// Estimated seconds remaining, if the worker can tell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressFrame {
    pub fn new(video_id: VideoId, stage: impl Into<String>, percent: u8) -> Self {
        Self {
            video_id,
            stage: stage.into(),
            percent: percent.min(100),
            eta_secs: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_eta(mut self, eta_secs: u64) -> Self {
        self.eta_secs = Some(eta_secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_clamped() {
        let frame = ProgressFrame::new(VideoId::new(), "transcode", 150);
        assert_eq!(frame.percent, 100);
    }
}
