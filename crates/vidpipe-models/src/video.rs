//! Video entity and pipeline bookkeeping.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub Uuid);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for VideoId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Pipeline life-cycle state of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Row created, transcode not yet published
    #[default]
    Pending,
    /// Transcode job published, waiting for a worker
    Queued,
    /// A worker claimed the job and is producing output
    Processing,
    /// Transcode finished, outputs persisted
    Ready,
    /// Last attempt failed, eligible for retry
    Failed,
    /// Retry budget exhausted, requires operator action
    DeadLetter,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Queued => "queued",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
            VideoStatus::DeadLetter => "dead_letter",
        }
    }

    /// Check if this is a terminal state (no more transitions without admin input).
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::DeadLetter)
    }

    /// States an admin retry is accepted from.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VideoStatus::Failed | VideoStatus::DeadLetter)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "queued" => Ok(VideoStatus::Queued),
            "processing" => Ok(VideoStatus::Processing),
            "ready" => Ok(VideoStatus::Ready),
            "failed" => Ok(VideoStatus::Failed),
            "dead_letter" => Ok(VideoStatus::DeadLetter),
            other => Err(format!("unknown video status: {}", other)),
        }
    }
}

/// One terminal-failure event observed for a video.
///
/// `error_history` is append-only; its length equals the number of failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorRecord {
    /// Attempt number at the time of failure (1-based)
    pub attempt: u32,
    /// Human-readable error
    pub error: String,
    /// Worker that reported the failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// Pipeline stage the failure occurred in
    pub stage: String,
    /// When the failure was recorded
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(attempt: u32, error: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            attempt,
            error: error.into(),
            worker_id: None,
            stage: stage.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }
}

/// Per-quality output sizes in bytes, keyed by quality label ("1080p", "720p", ...).
pub type QualitySizes = HashMap<String, u64>;

/// The central pipeline entity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    /// Surrogate key
    pub id: VideoId,
    /// Public shareable slug, 8-12 chars, globally unique
    pub code: String,
    /// Owner
    pub user_id: Uuid,
    /// Optional category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: VideoStatus,

    // Pipeline bookkeeping
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Non-null iff `status == Processing`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_history: Vec<ErrorRecord>,

    // Outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_path_h264: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub disk_usage: u64,
    #[serde(default)]
    pub quality_sizes: QualitySizes,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outputs a transcode worker reports on completion.
///
/// A single transcode job produces both HLS renditions; the worker reports
/// them together in one callback.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscodeOutputs {
    pub hls_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_path_h264: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub disk_usage: u64,
    #[serde(default)]
    pub quality_sizes: QualitySizes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::new();
        let id2 = VideoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            VideoStatus::Pending,
            VideoStatus::Queued,
            VideoStatus::Processing,
            VideoStatus::Ready,
            VideoStatus::Failed,
            VideoStatus::DeadLetter,
        ] {
            assert_eq!(s.as_str().parse::<VideoStatus>().unwrap(), s);
        }
    }

    #[test]
    fn test_terminal_and_retryable() {
        assert!(VideoStatus::Ready.is_terminal());
        assert!(VideoStatus::DeadLetter.is_terminal());
        assert!(!VideoStatus::Processing.is_terminal());

        assert!(VideoStatus::Failed.is_retryable());
        assert!(VideoStatus::DeadLetter.is_retryable());
        assert!(!VideoStatus::Queued.is_retryable());
    }
}
