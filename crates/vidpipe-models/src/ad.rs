//! Ad impression records, written by the surrounding application.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::video::VideoId;

/// One recorded ad impression. Write-mostly; the pipeline never reads these.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdImpression {
    pub id: Uuid,
    pub video_id: VideoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Placement slot ("preroll", "midroll", "overlay")
    pub placement: String,
    pub watched_ms: u64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}
