//! Multipart direct-upload sessions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ephemeral multipart upload state.
///
/// No Video row exists until the session completes; an abort or TTL expiry
/// deletes the session and aborts the object-store upload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadSession {
    pub id: Uuid,
    /// Object-store multipart upload handle
    pub upload_id: String,
    /// Reserved public code the eventual Video row will carry
    pub video_code: String,
    pub user_id: Uuid,
    /// Destination key of the assembled object
    pub object_path: String,
    pub filename: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub total_size: u64,
    pub part_size: u64,
    pub total_parts: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Number of parts needed to upload `size` bytes at `part_size` per part.
///
/// `size == part_size` yields exactly one part. Zero-size uploads are
/// rejected upstream, before this is called.
pub fn part_count(size: u64, part_size: u64) -> u32 {
    debug_assert!(size > 0 && part_size > 0);
    size.div_ceil(part_size) as u32
}

/// One completed part, echoed back by the client at Complete time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_count_exact_multiple() {
        assert_eq!(part_count(50 * 1024 * 1024, 10 * 1024 * 1024), 5);
    }

    #[test]
    fn test_part_count_single_part() {
        assert_eq!(part_count(10 * 1024 * 1024, 10 * 1024 * 1024), 1);
    }

    #[test]
    fn test_part_count_remainder() {
        assert_eq!(part_count(10 * 1024 * 1024 + 1, 10 * 1024 * 1024), 2);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let session = UploadSession {
            id: Uuid::new_v4(),
            upload_id: "u1".into(),
            video_code: "abcd1234".into(),
            user_id: Uuid::new_v4(),
            object_path: "uploads/abcd1234/v.mp4".into(),
            filename: "v.mp4".into(),
            content_type: "video/mp4".into(),
            title: None,
            total_size: 1,
            part_size: 1,
            total_parts: 1,
            expires_at: now - chrono::Duration::seconds(1),
            created_at: now - chrono::Duration::hours(2),
        };
        assert!(session.is_expired(now));
    }
}
