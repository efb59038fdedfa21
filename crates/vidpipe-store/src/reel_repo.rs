//! Reel repository.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use vidpipe_models::{Reel, ReelId, ReelStatus, Segment, VideoId};

use crate::error::{StoreError, StoreResult};

const REEL_COLUMNS: &str = "id, video_id, user_id, title, style, segments, status, \
     output_path, export_error, thumbnail_url, duration, size_bytes, exported_at, \
     processing_started_at, created_at, updated_at";

/// Fields for a new reel row. Segment validation happens in the coordinator,
/// before this is reached.
#[derive(Debug, Clone)]
pub struct NewReel {
    pub id: ReelId,
    pub video_id: VideoId,
    pub user_id: Uuid,
    pub title: String,
    pub style: String,
    pub segments: Vec<Segment>,
}

/// Export outputs reported by the render worker.
#[derive(Debug, Clone)]
pub struct ReelOutputs {
    pub output_path: String,
    pub thumbnail_url: Option<String>,
    pub duration: Option<f64>,
    pub size_bytes: u64,
}

fn row_to_reel(row: &PgRow) -> StoreResult<Reel> {
    let status: String = row.try_get("status")?;
    let segments: serde_json::Value = row.try_get("segments")?;
    let size_bytes: i64 = row.try_get("size_bytes")?;

    Ok(Reel {
        id: ReelId(row.try_get("id")?),
        video_id: VideoId(row.try_get("video_id")?),
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        style: row.try_get("style")?,
        segments: serde_json::from_value(segments)?,
        status: status.parse().map_err(StoreError::decode)?,
        output_path: row.try_get("output_path")?,
        export_error: row.try_get("export_error")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        duration: row.try_get("duration")?,
        size_bytes: size_bytes.max(0) as u64,
        exported_at: row.try_get("exported_at")?,
        processing_started_at: row.try_get("processing_started_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Repository for reel rows.
#[derive(Clone)]
pub struct ReelRepo {
    pool: PgPool,
}

impl ReelRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewReel) -> StoreResult<Reel> {
        let row = sqlx::query(&format!(
            "INSERT INTO reels (id, video_id, user_id, title, style, segments, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'draft')
             RETURNING {REEL_COLUMNS}"
        ))
        .bind(new.id.0)
        .bind(new.video_id.0)
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.style)
        .bind(serde_json::to_value(&new.segments)?)
        .fetch_one(&self.pool)
        .await?;

        info!(reel_id = %new.id, video_id = %new.video_id, "Created reel");
        row_to_reel(&row)
    }

    pub async fn get(&self, id: ReelId) -> StoreResult<Reel> {
        let row = sqlx::query(&format!("SELECT {REEL_COLUMNS} FROM reels WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("reel {}", id)))?;
        row_to_reel(&row)
    }

    pub async fn list_by_video(&self, video_id: VideoId) -> StoreResult<Vec<Reel>> {
        let rows = sqlx::query(&format!(
            "SELECT {REEL_COLUMNS} FROM reels WHERE video_id = $1 ORDER BY created_at DESC"
        ))
        .bind(video_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_reel).collect()
    }

    /// Move to `exporting`, permitted from every state except `exporting`
    /// itself. Re-export from `ready` is the normal path after an edit; the
    /// prior `export_error` is wiped either way.
    pub async fn begin_export(&self, id: ReelId) -> StoreResult<Reel> {
        let row = sqlx::query(&format!(
            "UPDATE reels
             SET status = 'exporting', export_error = NULL,
                 processing_started_at = now(), updated_at = now()
             WHERE id = $1 AND status <> 'exporting'
             RETURNING {REEL_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                info!(reel_id = %id, "Reel export started");
                row_to_reel(&row)
            }
            None => {
                // Either missing or already exporting.
                let current = self.get(id).await?;
                Err(StoreError::conflict(format!(
                    "reel {} is already exporting",
                    current.id
                )))
            }
        }
    }

    /// Land on `ready`. Sets `output_path` and clears `export_error` in the
    /// same write — exactly one of the two is ever populated.
    pub async fn complete_export(&self, id: ReelId, outputs: &ReelOutputs) -> StoreResult<Reel> {
        let row = sqlx::query(&format!(
            "UPDATE reels
             SET status = 'ready', output_path = $2, export_error = NULL,
                 thumbnail_url = $3, duration = $4, size_bytes = $5,
                 exported_at = now(), processing_started_at = NULL, updated_at = now()
             WHERE id = $1 AND status = 'exporting'
             RETURNING {REEL_COLUMNS}"
        ))
        .bind(id.0)
        .bind(&outputs.output_path)
        .bind(&outputs.thumbnail_url)
        .bind(outputs.duration)
        .bind(outputs.size_bytes as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                info!(reel_id = %id, "Reel export complete");
                row_to_reel(&row)
            }
            None => {
                let current = self.get(id).await?;
                if current.status == ReelStatus::Ready {
                    // Redelivered completion.
                    return Ok(current);
                }
                Err(StoreError::conflict(format!(
                    "reel {} is {}, not exporting",
                    id, current.status
                )))
            }
        }
    }

    /// Land on `failed` with `export_error` set and `output_path` cleared.
    pub async fn fail_export(&self, id: ReelId, error: &str) -> StoreResult<Reel> {
        let row = sqlx::query(&format!(
            "UPDATE reels
             SET status = 'failed', export_error = $2, output_path = NULL,
                 processing_started_at = NULL, updated_at = now()
             WHERE id = $1 AND status = 'exporting'
             RETURNING {REEL_COLUMNS}"
        ))
        .bind(id.0)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_reel(&row),
            None => {
                let current = self.get(id).await?;
                if current.status == ReelStatus::Failed {
                    return Ok(current);
                }
                Err(StoreError::conflict(format!(
                    "reel {} is {}, not exporting",
                    id, current.status
                )))
            }
        }
    }

    /// Update mutable draft fields. Allowed in any non-exporting state.
    pub async fn update_title(&self, id: ReelId, title: &str) -> StoreResult<Reel> {
        let row = sqlx::query(&format!(
            "UPDATE reels SET title = $2, updated_at = now()
             WHERE id = $1 AND status <> 'exporting'
             RETURNING {REEL_COLUMNS}"
        ))
        .bind(id.0)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_reel(&row),
            None => {
                let current = self.get(id).await?;
                Err(StoreError::conflict(format!(
                    "reel {} is exporting, cannot edit",
                    current.id
                )))
            }
        }
    }

    /// Liveness beat while the render worker is active. Only touches
    /// exporting rows.
    pub async fn update_processing_timestamp(&self, id: ReelId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE reels SET processing_started_at = now(), updated_at = now()
             WHERE id = $1 AND status = 'exporting'",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Exporting rows whose timestamp predates `threshold`, oldest first.
    pub async fn list_stuck(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<Reel>> {
        let rows = sqlx::query(&format!(
            "SELECT {REEL_COLUMNS} FROM reels
             WHERE status = 'exporting' AND processing_started_at < $1
             ORDER BY processing_started_at ASC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_reel).collect()
    }

    /// Delete the row, returning it so the caller can clean up the exported
    /// object afterwards.
    pub async fn delete(&self, id: ReelId) -> StoreResult<Reel> {
        let row = sqlx::query(&format!(
            "DELETE FROM reels WHERE id = $1 RETURNING {REEL_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("reel {}", id)))?;

        info!(reel_id = %id, "Deleted reel");
        row_to_reel(&row)
    }
}
