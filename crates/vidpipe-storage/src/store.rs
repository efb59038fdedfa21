//! Unified object-store facade.
//!
//! `ObjectStore` delegates to whichever backend the deployment configured.
//! The common surface works everywhere; multipart and presigning exist only
//! on the S3 backend, and callers are expected to check
//! `supports_multipart()` before relying on them.

use std::time::Duration;

use tokio::io::AsyncRead;
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalStore;
use crate::s3::{S3Config, S3Store};

/// Information about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch)
    pub last_modified: Option<u64>,
}

/// A byte-range read: the requested window plus the total object size.
/// Dropping the stream closes the underlying handle.
pub struct RangedRead {
    pub stream: Box<dyn AsyncRead + Send + Unpin>,
    pub total_size: u64,
}

/// One part of a multipart upload, as confirmed by the object store.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

/// Unified object store.
#[derive(Clone)]
pub enum ObjectStore {
    Local(LocalStore),
    S3(S3Store),
}

impl ObjectStore {
    /// Build from environment: `STORAGE_BACKEND` selects `local` (default
    /// root `./data`) or `s3`.
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());
        match backend.as_str() {
            "local" => {
                let root = std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./data".to_string());
                info!("Using local object store at {}", root);
                Ok(Self::Local(LocalStore::new(root)))
            }
            "s3" => {
                info!("Using S3-compatible object store");
                Ok(Self::S3(S3Store::new(S3Config::from_env()?)))
            }
            other => Err(StorageError::config_error(format!(
                "unknown STORAGE_BACKEND: {}",
                other
            ))),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Local(_) => StorageBackend::Local,
            Self::S3(_) => StorageBackend::S3,
        }
    }

    /// Feature query gating the direct-upload orchestrator.
    pub fn supports_multipart(&self) -> bool {
        matches!(self, Self::S3(_))
    }

    pub async fn upload(
        &self,
        reader: impl AsyncRead + Unpin,
        key: &str,
        content_type: &str,
    ) -> StorageResult<u64> {
        match self {
            Self::Local(s) => s.upload(reader, key, content_type).await,
            Self::S3(s) => s.upload(reader, key, content_type).await,
        }
    }

    pub async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        match self {
            Self::Local(s) => s.download(key).await,
            Self::S3(s) => s.download(key).await,
        }
    }

    /// Inclusive byte-range read returning `(stream, total_size)`.
    pub async fn get_range(&self, key: &str, start: u64, end: u64) -> StorageResult<RangedRead> {
        match self {
            Self::Local(s) => s.get_range(key, start, end).await,
            Self::S3(s) => s.get_range(key, start, end).await,
        }
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        match self {
            Self::Local(s) => s.delete(key).await,
            Self::S3(s) => s.delete(key).await,
        }
    }

    /// Delete every object under a prefix, returning how many went away.
    pub async fn delete_folder(&self, prefix: &str) -> StorageResult<u32> {
        match self {
            Self::Local(s) => s.delete_folder(prefix).await,
            Self::S3(s) => s.delete_folder(prefix).await,
        }
    }

    pub async fn list_files(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        match self {
            Self::Local(s) => s.list_files(prefix).await,
            Self::S3(s) => s.list_files(prefix).await,
        }
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self {
            Self::Local(s) => s.exists(key).await,
            Self::S3(s) => s.exists(key).await,
        }
    }

    // ========================================================================
    // Remote-only surface
    // ========================================================================

    pub async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        match self {
            Self::Local(_) => Err(StorageError::NotSupported("create_multipart_upload")),
            Self::S3(s) => s.create_multipart_upload(key, content_type).await,
        }
    }

    pub async fn presign_part_url(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<String> {
        match self {
            Self::Local(_) => Err(StorageError::NotSupported("presign_part_url")),
            Self::S3(s) => s.presign_part_url(key, upload_id, part_number, expires_in).await,
        }
    }

    pub async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        match self {
            Self::Local(_) => Err(StorageError::NotSupported("complete_multipart_upload")),
            Self::S3(s) => s.complete_multipart_upload(key, upload_id, parts).await,
        }
    }

    pub async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        match self {
            Self::Local(_) => Err(StorageError::NotSupported("abort_multipart_upload")),
            Self::S3(s) => s.abort_multipart_upload(key, upload_id).await,
        }
    }

    pub async fn presign_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        match self {
            Self::Local(_) => Err(StorageError::NotSupported("presign_download_url")),
            Self::S3(s) => s.presign_download_url(key, expires_in).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_refuses_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::Local(LocalStore::new(dir.path()));

        assert!(!store.supports_multipart());

        let err = store
            .create_multipart_upload("uploads/x/v.mp4", "video/mp4")
            .await
            .unwrap_err();
        assert!(err.is_not_supported());

        let err = store
            .presign_download_url("hls/x/master.m3u8", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_not_supported());
    }
}
