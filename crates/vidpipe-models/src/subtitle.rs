//! Subtitle tracks, keyed per (video, language).

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::video::VideoId;

/// Unique identifier for a subtitle track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubtitleId(pub Uuid);

impl SubtitleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubtitleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubtitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SubtitleId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Which sub-pipeline produced the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleKind {
    /// Transcribed from the video's own audio
    Original,
    /// Translated from a ready original track
    Translated,
}

impl SubtitleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleKind::Original => "original",
            SubtitleKind::Translated => "translated",
        }
    }
}

impl fmt::Display for SubtitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubtitleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(SubtitleKind::Original),
            "translated" => Ok(SubtitleKind::Translated),
            other => Err(format!("unknown subtitle kind: {}", other)),
        }
    }
}

/// Subtitle pipeline state.
///
/// Original tracks run pending → queued → detecting → detected → processing →
/// ready/failed. Translated tracks run pending → queued → translating →
/// ready/failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStatus {
    #[default]
    Pending,
    Queued,
    Detecting,
    Detected,
    Processing,
    Translating,
    Ready,
    Failed,
}

impl SubtitleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleStatus::Pending => "pending",
            SubtitleStatus::Queued => "queued",
            SubtitleStatus::Detecting => "detecting",
            SubtitleStatus::Detected => "detected",
            SubtitleStatus::Processing => "processing",
            SubtitleStatus::Translating => "translating",
            SubtitleStatus::Ready => "ready",
            SubtitleStatus::Failed => "failed",
        }
    }

    /// States in which a worker is actively producing.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SubtitleStatus::Detecting | SubtitleStatus::Processing | SubtitleStatus::Translating
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubtitleStatus::Ready | SubtitleStatus::Failed)
    }
}

impl fmt::Display for SubtitleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubtitleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubtitleStatus::Pending),
            "queued" => Ok(SubtitleStatus::Queued),
            "detecting" => Ok(SubtitleStatus::Detecting),
            "detected" => Ok(SubtitleStatus::Detected),
            "processing" => Ok(SubtitleStatus::Processing),
            "translating" => Ok(SubtitleStatus::Translating),
            "ready" => Ok(SubtitleStatus::Ready),
            "failed" => Ok(SubtitleStatus::Failed),
            other => Err(format!("unknown subtitle status: {}", other)),
        }
    }
}

/// One subtitle track. `(video_id, language)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Subtitle {
    pub id: SubtitleId,
    pub video_id: VideoId,
    /// BCP-47-ish language tag ("en", "th", "pt-BR")
    pub language: String,
    pub kind: SubtitleKind,
    pub status: SubtitleStatus,
    /// Present iff `status == Ready`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srt_path: Option<String>,
    /// Non-null while a worker is actively producing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(SubtitleStatus::Detecting.is_active());
        assert!(SubtitleStatus::Processing.is_active());
        assert!(SubtitleStatus::Translating.is_active());
        assert!(!SubtitleStatus::Detected.is_active());
        assert!(!SubtitleStatus::Ready.is_active());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            SubtitleStatus::Pending,
            SubtitleStatus::Queued,
            SubtitleStatus::Detecting,
            SubtitleStatus::Detected,
            SubtitleStatus::Processing,
            SubtitleStatus::Translating,
            SubtitleStatus::Ready,
            SubtitleStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<SubtitleStatus>().unwrap(), s);
        }
    }
}
