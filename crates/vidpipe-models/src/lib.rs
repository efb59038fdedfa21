//! Shared data models for the vidpipe control plane.
//!
//! This crate provides Serde-serializable types for:
//! - Videos and their pipeline life-cycle
//! - Subtitle tracks (original and translated)
//! - Reel exports and segment validation
//! - Multipart upload sessions
//! - Worker presence heartbeats
//! - Progress frames for the UI fan-out
//! - System settings and audit records

pub mod ad;
pub mod patch;
pub mod progress;
pub mod reel;
pub mod settings;
pub mod subtitle;
pub mod upload;
pub mod video;
pub mod whitelist;
pub mod worker;

// Re-export common types
pub use ad::AdImpression;
pub use patch::Patch;
pub use progress::ProgressFrame;
pub use reel::{
    validate_segments, Reel, ReelId, ReelStatus, Segment, SegmentError, MAX_REEL_DURATION_SECS,
    MAX_REEL_SEGMENTS,
};
pub use settings::{
    SettingAuditRecord, SettingValue, SystemSetting, DEFAULT_MAX_RETRIES, DEFAULT_PART_SIZE,
    DEFAULT_PRESIGN_TTL_SECS,
};
pub use subtitle::{Subtitle, SubtitleId, SubtitleKind, SubtitleStatus};
pub use upload::{part_count, CompletedPart, UploadSession};
pub use video::{ErrorRecord, QualitySizes, TranscodeOutputs, Video, VideoId, VideoStatus};
pub use whitelist::WhitelistProfile;
pub use worker::{
    DiskInfo, WorkerPresence, WorkerStats, WorkerStatus, WorkerSummary, WorkerType,
};
