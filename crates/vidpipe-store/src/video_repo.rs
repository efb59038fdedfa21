//! Video repository: the authoritative pipeline state.
//!
//! Every transition that crosses an invariant (status + timestamp + history)
//! runs in a transaction; single-row preconditions use conditional writes
//! keyed on the expected prior status.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::info;
use uuid::Uuid;

use vidpipe_models::{ErrorRecord, Patch, TranscodeOutputs, Video, VideoId, VideoStatus};

use crate::error::{map_unique, StoreError, StoreResult};

const VIDEO_COLUMNS: &str = "id, code, user_id, category_id, title, description, status, \
     retry_count, last_error, processing_started_at, claimed_by, error_history, \
     original_path, hls_path, hls_path_h264, audio_path, thumbnail_url, duration, \
     detected_language, disk_usage, quality_sizes, created_at, updated_at";

/// Fields for a new video row.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub id: VideoId,
    pub code: String,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub original_path: Option<String>,
}

/// Server-side listing parameters.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Case-insensitive substring match on title or code
    pub search: Option<String>,
    pub status: Option<VideoStatus>,
    pub category_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub sort: VideoSort,
    pub limit: i64,
    pub offset: i64,
}

/// Sort orders the listing supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
    Title,
}

impl VideoSort {
    fn order_clause(&self) -> &'static str {
        match self {
            VideoSort::CreatedDesc => "created_at DESC",
            VideoSort::CreatedAsc => "created_at ASC",
            VideoSort::UpdatedDesc => "updated_at DESC",
            VideoSort::Title => "title ASC, created_at DESC",
        }
    }
}

/// A listing page with its total count.
#[derive(Debug, Clone)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub total: i64,
}

/// Metadata update descriptor. Each field says keep, set, or clear — a
/// zero value never doubles as "no change".
#[derive(Debug, Clone, Default)]
pub struct VideoMetaPatch {
    pub title: Patch<String>,
    pub description: Patch<String>,
    pub category_id: Patch<Uuid>,
}

impl VideoMetaPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_keep() && self.description.is_keep() && self.category_id.is_keep()
    }
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The row moved queued → processing
    Claimed,
    /// Same worker claimed twice; nothing changed
    AlreadyOwned,
}

fn row_to_video(row: &PgRow) -> StoreResult<Video> {
    let status: String = row.try_get("status")?;
    let error_history: serde_json::Value = row.try_get("error_history")?;
    let quality_sizes: serde_json::Value = row.try_get("quality_sizes")?;
    let disk_usage: i64 = row.try_get("disk_usage")?;

    Ok(Video {
        id: VideoId(row.try_get("id")?),
        code: row.try_get("code")?,
        user_id: row.try_get("user_id")?,
        category_id: row.try_get("category_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: status.parse().map_err(StoreError::decode)?,
        retry_count: row.try_get::<i32, _>("retry_count")? as u32,
        last_error: row.try_get("last_error")?,
        processing_started_at: row.try_get("processing_started_at")?,
        error_history: serde_json::from_value(error_history)?,
        original_path: row.try_get("original_path")?,
        hls_path: row.try_get("hls_path")?,
        hls_path_h264: row.try_get("hls_path_h264")?,
        audio_path: row.try_get("audio_path")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        duration: row.try_get("duration")?,
        detected_language: row.try_get("detected_language")?,
        disk_usage: disk_usage.max(0) as u64,
        quality_sizes: serde_json::from_value(quality_sizes)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Repository for video rows.
#[derive(Clone)]
pub struct VideoRepo {
    pool: PgPool,
}

impl VideoRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new `pending` video. A code collision surfaces as `Conflict`
    /// so the caller can re-roll the slug.
    pub async fn create(&self, new: NewVideo) -> StoreResult<Video> {
        let row = sqlx::query(&format!(
            "INSERT INTO videos (id, code, user_id, category_id, title, description, original_path, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(new.id.0)
        .bind(&new.code)
        .bind(new.user_id)
        .bind(new.category_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.original_path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "video code"))?;

        info!(video_id = %new.id, code = %new.code, "Created video");
        row_to_video(&row)
    }

    pub async fn get(&self, id: VideoId) -> StoreResult<Video> {
        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;
        row_to_video(&row)
    }

    pub async fn get_by_code(&self, code: &str) -> StoreResult<Video> {
        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video code {}", code)))?;
        row_to_video(&row)
    }

    /// Set the status unconditionally.
    ///
    /// Leaving `processing` through any path clears the processing timestamp
    /// and the claim, keeping the status/timestamp invariant intact.
    pub async fn update_status(&self, id: VideoId, status: VideoStatus) -> StoreResult<Video> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = $2,
                 processing_started_at = CASE WHEN $2 = 'processing' THEN processing_started_at ELSE NULL END,
                 claimed_by = CASE WHEN $2 = 'processing' THEN claimed_by ELSE NULL END,
                 updated_at = now()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;
        row_to_video(&row)
    }

    /// Apply a metadata patch. Untouched fields stay byte-identical; `title`
    /// cannot be cleared, only replaced.
    pub async fn update_meta(&self, id: VideoId, patch: &VideoMetaPatch) -> StoreResult<Video> {
        if patch.is_empty() {
            return self.get(id).await;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE videos SET updated_at = now()");

        match patch.title.as_ref() {
            Patch::Keep => {}
            Patch::Set(title) => {
                qb.push(", title = ").push_bind(title.clone());
            }
            Patch::Clear => {
                return Err(StoreError::conflict("title cannot be cleared"));
            }
        }
        match patch.description.as_ref() {
            Patch::Keep => {}
            Patch::Set(description) => {
                qb.push(", description = ").push_bind(description.clone());
            }
            Patch::Clear => {
                qb.push(", description = NULL");
            }
        }
        match patch.category_id.as_ref() {
            Patch::Keep => {}
            Patch::Set(category_id) => {
                qb.push(", category_id = ").push_bind(*category_id);
            }
            Patch::Clear => {
                qb.push(", category_id = NULL");
            }
        }

        qb.push(" WHERE id = ").push_bind(id.0);
        qb.push(format!(" RETURNING {VIDEO_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;
        row_to_video(&row)
    }

    /// Advance a `pending` row to `queued` after its job was published.
    pub async fn mark_queued(&self, id: VideoId) -> StoreResult<Video> {
        let row = sqlx::query(&format!(
            "UPDATE videos SET status = 'queued', updated_at = now()
             WHERE id = $1 AND status = 'pending'
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::conflict(format!("video {} is not pending", id)))?;
        row_to_video(&row)
    }

    /// The only write path that moves `queued → processing`.
    ///
    /// Conditional on the current status; a second claim by the same worker
    /// is an idempotent no-op, by anyone else a conflict. This enforces
    /// at-most-one concurrent processing per video.
    pub async fn claim(&self, id: VideoId, worker_id: &str) -> StoreResult<(Video, ClaimOutcome)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status, claimed_by FROM videos WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;

        let status: String = row.try_get("status")?;
        let status: VideoStatus = status.parse().map_err(StoreError::decode)?;
        let claimed_by: Option<String> = row.try_get("claimed_by")?;

        match status {
            VideoStatus::Queued => {}
            VideoStatus::Processing if claimed_by.as_deref() == Some(worker_id) => {
                let row = sqlx::query(&format!(
                    "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
                ))
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                return Ok((row_to_video(&row)?, ClaimOutcome::AlreadyOwned));
            }
            other => {
                return Err(StoreError::conflict(format!(
                    "video {} is {}, not queued",
                    id, other
                )));
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = 'processing', processing_started_at = now(), claimed_by = $2, updated_at = now()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .bind(worker_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(video_id = %id, worker_id, "Video claimed");
        Ok((row_to_video(&row)?, ClaimOutcome::Claimed))
    }

    /// Liveness beat: bump the processing timestamp, but only while the row
    /// is actually `processing`. Returns whether a row was touched; rows in
    /// any other state are left byte-identical.
    pub async fn update_processing_timestamp(&self, id: VideoId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE videos SET processing_started_at = now(), updated_at = now()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a terminal failure.
    ///
    /// One transaction: append to `error_history`, bump `retry_count`, set
    /// `last_error`, clear the processing timestamp, and land on `failed` —
    /// or `dead_letter` once the retry budget is spent.
    pub async fn mark_failed(
        &self,
        id: VideoId,
        error: &str,
        worker_id: Option<&str>,
        stage: &str,
        max_retries: u32,
    ) -> StoreResult<Video> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT retry_count, status FROM videos WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;

        let retry_count: i32 = row.try_get("retry_count")?;
        let attempt = retry_count as u32 + 1;

        let mut record = ErrorRecord::new(attempt, error, stage);
        if let Some(w) = worker_id {
            record = record.with_worker(w);
        }

        let next_status = if attempt >= max_retries {
            VideoStatus::DeadLetter
        } else {
            VideoStatus::Failed
        };

        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = $2,
                 retry_count = retry_count + 1,
                 last_error = $3,
                 processing_started_at = NULL,
                 claimed_by = NULL,
                 error_history = error_history || $4::jsonb,
                 updated_at = now()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .bind(next_status.as_str())
        .bind(error)
        .bind(serde_json::to_value(vec![record])?)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(video_id = %id, attempt, status = %next_status, "Video marked failed");
        row_to_video(&row)
    }

    /// Admin retry of a `failed` row: back to `pending` with the retry
    /// counter preserved, so repeated failures still walk toward the
    /// dead-letter budget. The caller republishes the job.
    pub async fn requeue_for_retry(&self, id: VideoId) -> StoreResult<Video> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = 'pending',
                 last_error = NULL,
                 processing_started_at = NULL,
                 claimed_by = NULL,
                 updated_at = now()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;

        info!(video_id = %id, "Video requeued for retry");
        row_to_video(&row)
    }

    /// Explicit admin reset: zero the retry budget, clear errors, back to
    /// `pending`. The dead-letter escape hatch; `error_history` is preserved.
    pub async fn reset_for_retry(&self, id: VideoId) -> StoreResult<Video> {
        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = 'pending',
                 retry_count = 0,
                 last_error = NULL,
                 processing_started_at = NULL,
                 claimed_by = NULL,
                 updated_at = now()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;

        info!(video_id = %id, "Video reset for retry");
        row_to_video(&row)
    }

    /// Append an error record without changing status or counters. Used for
    /// non-fatal problems a worker reports mid-job.
    pub async fn append_error_history(&self, id: VideoId, record: &ErrorRecord) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE videos SET error_history = error_history || $2::jsonb, updated_at = now()
             WHERE id = $1",
        )
        .bind(id.0)
        .bind(serde_json::to_value(vec![record.clone()])?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("video {}", id)));
        }
        Ok(())
    }

    /// Persist transcode outputs and land on `ready`.
    ///
    /// Re-completion of an already-`ready` row (message redelivery) is a
    /// no-op returning the stored row.
    pub async fn complete(&self, id: VideoId, outputs: &TranscodeOutputs) -> StoreResult<Video> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM videos WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {}", id)))?;

        let status: String = row.try_get("status")?;
        let status: VideoStatus = status.parse().map_err(StoreError::decode)?;

        match status {
            VideoStatus::Processing => {}
            VideoStatus::Ready => {
                let row = sqlx::query(&format!(
                    "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
                ))
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                return row_to_video(&row);
            }
            other => {
                return Err(StoreError::conflict(format!(
                    "video {} is {}, not processing",
                    id, other
                )));
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE videos
             SET status = 'ready',
                 processing_started_at = NULL,
                 claimed_by = NULL,
                 hls_path = $2,
                 hls_path_h264 = $3,
                 audio_path = $4,
                 thumbnail_url = $5,
                 duration = $6,
                 detected_language = COALESCE($7, detected_language),
                 disk_usage = $8,
                 quality_sizes = $9,
                 last_error = NULL,
                 updated_at = now()
             WHERE id = $1
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id.0)
        .bind(&outputs.hls_path)
        .bind(&outputs.hls_path_h264)
        .bind(&outputs.audio_path)
        .bind(&outputs.thumbnail_url)
        .bind(outputs.duration)
        .bind(&outputs.detected_language)
        .bind(outputs.disk_usage as i64)
        .bind(serde_json::to_value(&outputs.quality_sizes)?)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(video_id = %id, "Video ready");
        row_to_video(&row)
    }

    /// All `processing` rows whose timestamp predates `threshold`, oldest
    /// first. The stuck sweeper's scan.
    pub async fn list_stuck_processing(
        &self,
        threshold: DateTime<Utc>,
    ) -> StoreResult<Vec<Video>> {
        let rows = sqlx::query(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE status = 'processing' AND processing_started_at < $1
             ORDER BY processing_started_at ASC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_video).collect()
    }

    /// Filtered, paginated listing with a single total count.
    pub async fn list_with_filters(&self, filter: &VideoFilter) -> StoreResult<VideoPage> {
        fn push_predicates<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a VideoFilter) {
            qb.push(" WHERE 1=1");
            if let Some(search) = &filter.search {
                qb.push(" AND (title ILIKE ").push_bind(format!("%{}%", search));
                qb.push(" OR code ILIKE ").push_bind(format!("%{}%", search));
                qb.push(")");
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(category_id) = filter.category_id {
                qb.push(" AND category_id = ").push_bind(category_id);
            }
            if let Some(user_id) = filter.user_id {
                qb.push(" AND user_id = ").push_bind(user_id);
            }
            if let Some(after) = filter.created_after {
                qb.push(" AND created_at >= ").push_bind(after);
            }
            if let Some(before) = filter.created_before {
                qb.push(" AND created_at <= ").push_bind(before);
            }
        }

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM videos");
        push_predicates(&mut count_qb, filter);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {VIDEO_COLUMNS} FROM videos"));
        push_predicates(&mut qb, filter);
        qb.push(" ORDER BY ").push(filter.sort.order_clause());
        qb.push(" LIMIT ").push_bind(filter.limit.max(1));
        qb.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        let videos = rows.iter().map(row_to_video).collect::<StoreResult<_>>()?;

        Ok(VideoPage { videos, total })
    }

    /// Paginated dead-letter listing, most recently failed first.
    pub async fn list_dead_letter(&self, limit: i64, offset: i64) -> StoreResult<VideoPage> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM videos WHERE status = 'dead_letter'")
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let rows = sqlx::query(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE status = 'dead_letter'
             ORDER BY updated_at DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit.max(1))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        let videos = rows.iter().map(row_to_video).collect::<StoreResult<_>>()?;
        Ok(VideoPage { videos, total })
    }

    pub async fn delete(&self, id: VideoId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("video {}", id)));
        }
        info!(video_id = %id, "Deleted video");
        Ok(())
    }
}
