//! Postgres entity store for the vidpipe control plane.
//!
//! Authoritative persistence for videos, subtitles, reels, upload sessions,
//! system settings (with audit), ad impressions and whitelist profiles.
//! Transitions that cross invariants run inside transactions; single-row
//! preconditions are conditional writes keyed on the expected prior status.

pub mod ad_repo;
pub mod error;
pub mod pool;
pub mod reel_repo;
pub mod settings_repo;
pub mod subtitle_repo;
pub mod upload_repo;
pub mod video_repo;
pub mod whitelist_repo;

pub use ad_repo::AdImpressionRepo;
pub use error::{StoreError, StoreResult};
pub use pool::{connect, DbConfig};
pub use reel_repo::{NewReel, ReelOutputs, ReelRepo};
pub use settings_repo::SettingsRepo;
pub use subtitle_repo::SubtitleRepo;
pub use upload_repo::UploadSessionRepo;
pub use video_repo::{
    ClaimOutcome, NewVideo, VideoFilter, VideoMetaPatch, VideoPage, VideoRepo, VideoSort,
};
pub use whitelist_repo::WhitelistRepo;
