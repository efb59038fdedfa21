//! Job payloads carried on the bus.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vidpipe_models::{ReelId, SubtitleId, VideoId};

/// The job streams the control plane publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transcode,
    Subtitle,
    Reel,
    /// Published by the external cache warmer, never by the core; carried so
    /// the stats surface covers it.
    WarmCache,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Transcode,
        JobKind::Subtitle,
        JobKind::Reel,
        JobKind::WarmCache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Transcode => "transcode",
            JobKind::Subtitle => "subtitle",
            JobKind::Reel => "reel",
            JobKind::WarmCache => "warmcache",
        }
    }

    /// Stream the jobs of this kind live on.
    pub fn stream(&self) -> String {
        format!("jobs:{}", self.as_str())
    }

    /// Companion dead-letter stream.
    pub fn dlq_stream(&self) -> String {
        format!("jobs:{}:dlq", self.as_str())
    }

    /// Sorted set holding nak-delayed messages awaiting redelivery.
    pub fn scheduled_key(&self) -> String {
        format!("jobs:{}:scheduled", self.as_str())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transcode one uploaded video into HLS renditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub video_id: VideoId,
    pub code: String,
    #[serde(default)]
    pub priority: u8,
    pub created_at: DateTime<Utc>,
}

impl TranscodeJob {
    pub fn new(video_id: VideoId, code: impl Into<String>) -> Self {
        Self {
            video_id,
            code: code.into(),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    /// One transcode in flight per video.
    pub fn idempotency_key(&self) -> String {
        Self::key_for(self.video_id)
    }

    pub fn key_for(video_id: VideoId) -> String {
        format!("transcode:{}", video_id)
    }
}

/// Which subtitle stage the worker should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStage {
    Detect,
    Transcribe,
    Translate,
}

impl SubtitleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleStage::Detect => "detect",
            SubtitleStage::Transcribe => "transcribe",
            SubtitleStage::Translate => "translate",
        }
    }
}

impl fmt::Display for SubtitleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Produce or translate one subtitle track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleJob {
    pub subtitle_id: SubtitleId,
    pub video_id: VideoId,
    pub language: String,
    pub stage: SubtitleStage,
    pub created_at: DateTime<Utc>,
}

impl SubtitleJob {
    pub fn new(
        subtitle_id: SubtitleId,
        video_id: VideoId,
        language: impl Into<String>,
        stage: SubtitleStage,
    ) -> Self {
        Self {
            subtitle_id,
            video_id,
            language: language.into(),
            stage,
            created_at: Utc::now(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("subtitle:{}:{}:{}", self.video_id, self.language, self.stage)
    }
}

/// Render a reel composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelExportJob {
    pub reel_id: ReelId,
    pub video_id: VideoId,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl ReelExportJob {
    pub fn new(reel_id: ReelId, video_id: VideoId, code: impl Into<String>) -> Self {
        Self {
            reel_id,
            video_id,
            code: code.into(),
            created_at: Utc::now(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        Self::key_for(self.reel_id)
    }

    /// The key depends only on the reel id; handy for purge paths that have
    /// no job in hand.
    pub fn key_for(reel_id: ReelId) -> String {
        format!("reel:{}", reel_id)
    }
}

/// Any job the core publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum QueueJob {
    Transcode(TranscodeJob),
    Subtitle(SubtitleJob),
    ReelExport(ReelExportJob),
}

impl QueueJob {
    pub fn kind(&self) -> JobKind {
        match self {
            QueueJob::Transcode(_) => JobKind::Transcode,
            QueueJob::Subtitle(_) => JobKind::Subtitle,
            QueueJob::ReelExport(_) => JobKind::Reel,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::Transcode(j) => j.idempotency_key(),
            QueueJob::Subtitle(j) => j.idempotency_key(),
            QueueJob::ReelExport(j) => j.idempotency_key(),
        }
    }

    pub fn video_id(&self) -> VideoId {
        match self {
            QueueJob::Transcode(j) => j.video_id,
            QueueJob::Subtitle(j) => j.video_id,
            QueueJob::ReelExport(j) => j.video_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_keys_are_stable() {
        let video_id = VideoId::new();
        let a = TranscodeJob::new(video_id, "abc123xy");
        let b = TranscodeJob::new(video_id, "abc123xy");
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn test_subtitle_key_distinguishes_stage() {
        let subtitle_id = SubtitleId::new();
        let video_id = VideoId::new();
        let detect = SubtitleJob::new(subtitle_id, video_id, "en", SubtitleStage::Detect);
        let translate = SubtitleJob::new(subtitle_id, video_id, "en", SubtitleStage::Translate);
        assert_ne!(detect.idempotency_key(), translate.idempotency_key());
    }

    #[test]
    fn test_job_round_trips_through_json() {
        let job = QueueJob::Transcode(TranscodeJob::new(VideoId::new(), "abc123xy"));
        let payload = serde_json::to_string(&job).unwrap();
        let parsed: QueueJob = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.idempotency_key(), job.idempotency_key());
        assert_eq!(parsed.kind(), JobKind::Transcode);
    }
}
