//! Redis-backed messaging for the vidpipe control plane.
//!
//! This crate provides:
//! - The durable job bus (streams with per-message leases, retry/DLQ, purge)
//! - The worker presence registry over heartbeat keys
//! - The per-video progress pub/sub channel

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;
pub mod registry;

pub use error::{QueueError, QueueResult};
pub use job::{
    JobKind, QueueJob, ReelExportJob, SubtitleJob, SubtitleStage, TranscodeJob,
};
pub use progress::ProgressChannel;
pub use queue::{Delivery, JobQueue, KindStats, QueueConfig};
pub use registry::{
    OnlineWorkers, WorkerRegistry, HEARTBEAT_INTERVAL_SECS, PRESENCE_TTL_SECS,
};
