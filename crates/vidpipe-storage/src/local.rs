//! Local filesystem backend.
//!
//! Satisfies the common capability surface only; multipart and presigning
//! return `StorageError::NotSupported` so the direct-upload orchestrator can
//! refuse early.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectInfo, RangedRead};

/// Filesystem-rooted object store.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a local store rooted at `root`. The directory is created on
    /// first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key, rejecting traversal outside the root.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(key);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }

    pub async fn upload(
        &self,
        mut reader: impl tokio::io::AsyncRead + Unpin,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<u64> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        debug!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }

    pub async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Byte-range read. Returns the stream plus the total object size; the
    /// file handle closes when the stream is dropped.
    pub async fn get_range(&self, key: &str, start: u64, end: u64) -> StorageResult<RangedRead> {
        if end < start {
            return Err(StorageError::InvalidRange { start, end });
        }

        let path = self.resolve(key)?;
        let mut file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(key))
            }
            Err(e) => return Err(e.into()),
        };

        let total_size = file.metadata().await?.len();
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let len = end.saturating_sub(start) + 1;

        Ok(RangedRead {
            stream: Box::new(file.take(len)),
            total_size,
        })
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting a missing object is a no-op, matching the S3 backend.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(e.to_string())),
        }
    }

    pub async fn delete_folder(&self, prefix: &str) -> StorageResult<u32> {
        let path = self.resolve(prefix.trim_end_matches('/'))?;
        let count = self.list_files(prefix).await?.len() as u32;
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!("Deleted folder {} ({} objects)", prefix, count);
                Ok(count)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StorageError::delete_failed(e.to_string())),
        }
    }

    pub async fn list_files(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let dir = self.resolve(prefix.trim_end_matches('/'))?;
        let mut objects = Vec::new();
        let mut stack = vec![dir];

        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::ListFailed(e.to_string())),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?
            {
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    let key = entry
                        .path()
                        .strip_prefix(&self.root)
                        .map(|p| p.to_string_lossy().replace('\\', "/"))
                        .unwrap_or_default();
                    objects.push(ObjectInfo {
                        key,
                        size: meta.len(),
                        last_modified: meta
                            .modified()
                            .ok()
                            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                            .map(|d| d.as_millis() as u64),
                    });
                }
            }
        }

        Ok(objects)
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_upload_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .upload(&b"hello world"[..], "hls/abc/master.m3u8", "text/plain")
            .await
            .unwrap();

        let bytes = store.download("hls/abc/master.m3u8").await.unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn test_range_read_returns_total_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store
            .upload(&b"0123456789"[..], "hls/abc/seg.ts", "video/mp2t")
            .await
            .unwrap();

        let mut ranged = store.get_range("hls/abc/seg.ts", 2, 5).await.unwrap();
        assert_eq!(ranged.total_size, 10);

        let mut buf = Vec::new();
        ranged.stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"2345");
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.download("../escape").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_delete_folder_counts_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.upload(&b"a"[..], "reels/xy/1.mp4", "video/mp4").await.unwrap();
        store.upload(&b"b"[..], "reels/xy/2.mp4", "video/mp4").await.unwrap();

        let deleted = store.delete_folder("reels/xy/").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(!store.exists("reels/xy/1.mp4").await.unwrap());
    }
}
