//! Subtitle repository.
//!
//! Transitions are conditional on the expected prior status; a mismatch is a
//! `Conflict` the worker treats as "state advanced, stop".

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;

use vidpipe_models::{Subtitle, SubtitleId, SubtitleKind, SubtitleStatus, VideoId};

use crate::error::{map_unique, StoreError, StoreResult};

const SUBTITLE_COLUMNS: &str = "id, video_id, language, kind, status, srt_path, \
     processing_started_at, last_error, retry_count, created_at, updated_at";

fn row_to_subtitle(row: &PgRow) -> StoreResult<Subtitle> {
    let status: String = row.try_get("status")?;
    let kind: String = row.try_get("kind")?;

    Ok(Subtitle {
        id: SubtitleId(row.try_get("id")?),
        video_id: VideoId(row.try_get("video_id")?),
        language: row.try_get("language")?,
        kind: kind.parse().map_err(StoreError::decode)?,
        status: status.parse().map_err(StoreError::decode)?,
        srt_path: row.try_get("srt_path")?,
        processing_started_at: row.try_get("processing_started_at")?,
        last_error: row.try_get("last_error")?,
        retry_count: row.try_get::<i32, _>("retry_count")? as u32,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Repository for subtitle tracks.
#[derive(Clone)]
pub struct SubtitleRepo {
    pool: PgPool,
}

impl SubtitleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new `pending` track. `(video_id, language)` is a hard unique
    /// constraint; a duplicate surfaces as `Conflict` — retry of a track is
    /// delete-then-recreate, never upsert.
    pub async fn create(
        &self,
        id: SubtitleId,
        video_id: VideoId,
        language: &str,
        kind: SubtitleKind,
    ) -> StoreResult<Subtitle> {
        let row = sqlx::query(&format!(
            "INSERT INTO subtitles (id, video_id, language, kind, status)
             VALUES ($1, $2, $3, $4, 'pending')
             RETURNING {SUBTITLE_COLUMNS}"
        ))
        .bind(id.0)
        .bind(video_id.0)
        .bind(language)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "subtitle (video, language)"))?;

        info!(subtitle_id = %id, video_id = %video_id, language, "Created subtitle track");
        row_to_subtitle(&row)
    }

    pub async fn get(&self, id: SubtitleId) -> StoreResult<Subtitle> {
        let row = sqlx::query(&format!(
            "SELECT {SUBTITLE_COLUMNS} FROM subtitles WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("subtitle {}", id)))?;
        row_to_subtitle(&row)
    }

    pub async fn list_by_video(&self, video_id: VideoId) -> StoreResult<Vec<Subtitle>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBTITLE_COLUMNS} FROM subtitles WHERE video_id = $1 ORDER BY created_at ASC"
        ))
        .bind(video_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_subtitle).collect()
    }

    /// Find a video's original track, if one exists.
    pub async fn get_original(&self, video_id: VideoId) -> StoreResult<Option<Subtitle>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBTITLE_COLUMNS} FROM subtitles WHERE video_id = $1 AND kind = 'original'"
        ))
        .bind(video_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_subtitle).transpose()
    }

    /// Conditional status move. `from` lists the accepted prior states;
    /// anything else is a `Conflict`. Entering an active state stamps
    /// `processing_started_at`; leaving one clears it.
    pub async fn transition(
        &self,
        id: SubtitleId,
        from: &[SubtitleStatus],
        to: SubtitleStatus,
    ) -> StoreResult<Subtitle> {
        let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

        let row = sqlx::query(&format!(
            "UPDATE subtitles
             SET status = $2,
                 processing_started_at = CASE WHEN $3 THEN now() ELSE NULL END,
                 updated_at = now()
             WHERE id = $1 AND status = ANY($4)
             RETURNING {SUBTITLE_COLUMNS}"
        ))
        .bind(id.0)
        .bind(to.as_str())
        .bind(to.is_active())
        .bind(&from_strs)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_subtitle(&row),
            None => {
                // Distinguish missing from precondition failure.
                let current = self.get(id).await?;
                Err(StoreError::conflict(format!(
                    "subtitle {} is {}, expected one of {:?}",
                    id, current.status, from_strs
                )))
            }
        }
    }

    /// Record the detected language on the original track and move it to
    /// `detected`. Renaming the row can collide with an existing translated
    /// track for the same language; that surfaces as `Conflict`.
    pub async fn set_detected(&self, id: SubtitleId, language: &str) -> StoreResult<Subtitle> {
        let row = sqlx::query(&format!(
            "UPDATE subtitles
             SET status = 'detected', language = $2, processing_started_at = NULL, updated_at = now()
             WHERE id = $1 AND status = 'detecting'
             RETURNING {SUBTITLE_COLUMNS}"
        ))
        .bind(id.0)
        .bind(language)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "subtitle (video, language)"))?;

        match row {
            Some(row) => {
                info!(subtitle_id = %id, language, "Subtitle language detected");
                row_to_subtitle(&row)
            }
            None => {
                let current = self.get(id).await?;
                Err(StoreError::conflict(format!(
                    "subtitle {} is {}, not detecting",
                    id, current.status
                )))
            }
        }
    }

    /// Liveness beat while a worker is producing. Only touches active rows.
    pub async fn update_processing_timestamp(&self, id: SubtitleId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE subtitles SET processing_started_at = now(), updated_at = now()
             WHERE id = $1 AND status IN ('detecting', 'processing', 'translating')",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Land on `ready` with the produced track file.
    pub async fn complete(&self, id: SubtitleId, srt_path: &str) -> StoreResult<Subtitle> {
        let row = sqlx::query(&format!(
            "UPDATE subtitles
             SET status = 'ready', srt_path = $2, processing_started_at = NULL,
                 last_error = NULL, updated_at = now()
             WHERE id = $1 AND status IN ('processing', 'translating')
             RETURNING {SUBTITLE_COLUMNS}"
        ))
        .bind(id.0)
        .bind(srt_path)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                info!(subtitle_id = %id, "Subtitle ready");
                row_to_subtitle(&row)
            }
            None => {
                let current = self.get(id).await?;
                if current.status == SubtitleStatus::Ready {
                    // Redelivered completion; keep the stored row.
                    return Ok(current);
                }
                Err(StoreError::conflict(format!(
                    "subtitle {} is {}, not producing",
                    id, current.status
                )))
            }
        }
    }

    /// Record a failure on any non-terminal state.
    pub async fn fail(&self, id: SubtitleId, error: &str) -> StoreResult<Subtitle> {
        let row = sqlx::query(&format!(
            "UPDATE subtitles
             SET status = 'failed', last_error = $2, retry_count = retry_count + 1,
                 processing_started_at = NULL, srt_path = NULL, updated_at = now()
             WHERE id = $1 AND status NOT IN ('ready', 'failed')
             RETURNING {SUBTITLE_COLUMNS}"
        ))
        .bind(id.0)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_subtitle(&row),
            None => {
                let current = self.get(id).await?;
                if current.status == SubtitleStatus::Failed {
                    return Ok(current);
                }
                Err(StoreError::conflict(format!(
                    "subtitle {} is {}, cannot fail",
                    id, current.status
                )))
            }
        }
    }

    /// Active rows whose timestamp predates `threshold`, oldest first.
    pub async fn list_stuck(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<Subtitle>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBTITLE_COLUMNS} FROM subtitles
             WHERE status IN ('detecting', 'processing', 'translating')
               AND processing_started_at < $1
             ORDER BY processing_started_at ASC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_subtitle).collect()
    }

    pub async fn delete(&self, id: SubtitleId) -> StoreResult<Subtitle> {
        let row = sqlx::query(&format!(
            "DELETE FROM subtitles WHERE id = $1 RETURNING {SUBTITLE_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("subtitle {}", id)))?;

        info!(subtitle_id = %id, "Deleted subtitle track");
        row_to_subtitle(&row)
    }
}
