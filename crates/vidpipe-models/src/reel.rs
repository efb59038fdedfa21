//! Reels: short composite exports cut from a source video.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::video::VideoId;

/// Maximum number of segments per reel.
pub const MAX_REEL_SEGMENTS: usize = 10;

/// Maximum total reel duration in seconds (inclusive).
pub const MAX_REEL_DURATION_SECS: f64 = 60.0;

/// Unique identifier for a reel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ReelId(pub Uuid);

impl ReelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReelId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Reel export life-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReelStatus {
    #[default]
    Draft,
    Exporting,
    Ready,
    Failed,
}

impl ReelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReelStatus::Draft => "draft",
            ReelStatus::Exporting => "exporting",
            ReelStatus::Ready => "ready",
            ReelStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ReelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ReelStatus::Draft),
            "exporting" => Ok(ReelStatus::Exporting),
            "ready" => Ok(ReelStatus::Ready),
            "failed" => Ok(ReelStatus::Failed),
            other => Err(format!("unknown reel status: {}", other)),
        }
    }
}

/// One source segment, in seconds from the start of the video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Why a segment list was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("a reel requires at least one segment")]
    Empty,
    #[error("too many segments: {0} (max {MAX_REEL_SEGMENTS})")]
    TooMany(usize),
    #[error("segment {index} has end ({end}) <= start ({start})")]
    Inverted { index: usize, start: f64, end: f64 },
    #[error("segment {index} has a negative start ({start})")]
    NegativeStart { index: usize, start: f64 },
    #[error("total duration {total:.3}s exceeds {MAX_REEL_DURATION_SECS}s")]
    TooLong { total: f64 },
}

/// Validate a reel's segment list.
///
/// Exactly 60 seconds total is accepted; anything beyond is not.
pub fn validate_segments(segments: &[Segment]) -> Result<(), SegmentError> {
    if segments.is_empty() {
        return Err(SegmentError::Empty);
    }
    if segments.len() > MAX_REEL_SEGMENTS {
        return Err(SegmentError::TooMany(segments.len()));
    }

    let mut total = 0.0;
    for (index, seg) in segments.iter().enumerate() {
        if seg.start < 0.0 {
            return Err(SegmentError::NegativeStart { index, start: seg.start });
        }
        if seg.end <= seg.start {
            return Err(SegmentError::Inverted {
                index,
                start: seg.start,
                end: seg.end,
            });
        }
        total += seg.duration();
    }

    if total > MAX_REEL_DURATION_SECS {
        return Err(SegmentError::TooLong { total });
    }

    Ok(())
}

/// A short composite export referencing a source video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Reel {
    pub id: ReelId,
    pub video_id: VideoId,
    pub user_id: Uuid,
    pub title: String,
    /// Render style label ("letterbox", "split", ...)
    pub style: String,
    pub segments: Vec<Segment>,
    pub status: ReelStatus,
    /// Set on successful export; mutually exclusive with `export_error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reel {
    /// Total source duration covered by the segments.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_ok() {
        assert!(validate_segments(&[Segment::new(0.0, 15.0)]).is_ok());
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(validate_segments(&[]), Err(SegmentError::Empty));
    }

    #[test]
    fn test_exactly_sixty_seconds_accepted() {
        assert!(validate_segments(&[Segment::new(0.0, 30.0), Segment::new(40.0, 70.0)]).is_ok());
    }

    #[test]
    fn test_just_over_sixty_rejected() {
        let err = validate_segments(&[Segment::new(0.0, 30.0), Segment::new(40.0, 70.001)]);
        assert!(matches!(err, Err(SegmentError::TooLong { .. })));
    }

    #[test]
    fn test_inverted_segment_rejected() {
        let err = validate_segments(&[Segment::new(0.0, 30.0), Segment::new(70.0, 40.0)]);
        assert!(matches!(err, Err(SegmentError::Inverted { index: 1, .. })));
    }

    #[test]
    fn test_too_many_segments_rejected() {
        let segments: Vec<Segment> = (0..11).map(|i| Segment::new(i as f64, i as f64 + 0.5)).collect();
        assert_eq!(validate_segments(&segments), Err(SegmentError::TooMany(11)));
    }

    #[test]
    fn test_negative_start_rejected() {
        let err = validate_segments(&[Segment::new(-1.0, 5.0)]);
        assert!(matches!(err, Err(SegmentError::NegativeStart { index: 0, .. })));
    }
}
