//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A state-machine precondition did not hold.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The configured storage backend lacks a required capability.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Object-store assembly of a completed multipart upload failed; the
    /// session is kept for a forensic abort.
    #[error("Upload assembly failed: {0}")]
    UploadAssemblyFailed(String),

    #[error("Upload session expired")]
    SessionExpired,

    #[error(transparent)]
    Store(vidpipe_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vidpipe_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] vidpipe_storage::StorageError),
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<vidpipe_store::StoreError> for PipelineError {
    /// Lift the store's typed failures so callers see one taxonomy.
    fn from(err: vidpipe_store::StoreError) -> Self {
        use vidpipe_store::StoreError;
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Conflict(what),
            other => Self::Store(other),
        }
    }
}

impl From<vidpipe_models::SegmentError> for PipelineError {
    fn from(err: vidpipe_models::SegmentError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
