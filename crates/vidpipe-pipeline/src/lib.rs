//! Job coordination for the vidpipe control plane.
//!
//! The state machines that govern a video's journey, the stuck-job sweeper,
//! and the direct-upload orchestrator. Persistence lives in `vidpipe-store`,
//! messaging in `vidpipe-queue`; this crate only decides transitions.

pub mod codes;
pub mod config;
pub mod error;
pub mod reel;
pub mod stuck;
pub mod subtitle;
pub mod upload;
pub mod video;

pub use codes::{is_valid_code, new_code};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use reel::ReelExporter;
pub use stuck::{StuckJobDetector, SweepReport};
pub use subtitle::{SubtitlePipeline, UNDETERMINED_LANGUAGE};
pub use upload::{
    CompletedUpload, InitializedUpload, PartUrl, UploadOrchestrator,
};
pub use video::VideoPipeline;
