//! Ad impression repository. Write-mostly side store.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use vidpipe_models::{AdImpression, VideoId};

use crate::error::StoreResult;

fn row_to_impression(row: &PgRow) -> StoreResult<AdImpression> {
    Ok(AdImpression {
        id: row.try_get("id")?,
        video_id: VideoId(row.try_get("video_id")?),
        user_id: row.try_get("user_id")?,
        placement: row.try_get("placement")?,
        watched_ms: row.try_get::<i64, _>("watched_ms")? as u64,
        completed: row.try_get("completed")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct AdImpressionRepo {
    pool: PgPool,
}

impl AdImpressionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        video_id: VideoId,
        user_id: Option<Uuid>,
        placement: &str,
        watched_ms: u64,
        completed: bool,
    ) -> StoreResult<AdImpression> {
        let row = sqlx::query(
            "INSERT INTO ad_impressions (id, video_id, user_id, placement, watched_ms, completed)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, video_id, user_id, placement, watched_ms, completed, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(video_id.0)
        .bind(user_id)
        .bind(placement)
        .bind(watched_ms as i64)
        .bind(completed)
        .fetch_one(&self.pool)
        .await?;

        row_to_impression(&row)
    }

    pub async fn count_for_video(&self, video_id: VideoId) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM ad_impressions WHERE video_id = $1")
            .bind(video_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }
}
