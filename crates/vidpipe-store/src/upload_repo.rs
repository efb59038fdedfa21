//! Upload session repository.
//!
//! Sessions are ephemeral: created at Init, deleted at Complete/Abort or by
//! the expiry reaper. The transactional create-video-and-delete-session step
//! lives here because it spans both tables.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use vidpipe_models::{UploadSession, Video, VideoId};

use crate::error::{map_unique, StoreError, StoreResult};
use crate::video_repo::NewVideo;

const SESSION_COLUMNS: &str = "id, upload_id, video_code, user_id, object_path, filename, \
     content_type, title, total_size, part_size, total_parts, expires_at, created_at";

fn row_to_session(row: &PgRow) -> StoreResult<UploadSession> {
    Ok(UploadSession {
        id: row.try_get("id")?,
        upload_id: row.try_get("upload_id")?,
        video_code: row.try_get("video_code")?,
        user_id: row.try_get("user_id")?,
        object_path: row.try_get("object_path")?,
        filename: row.try_get("filename")?,
        content_type: row.try_get("content_type")?,
        title: row.try_get("title")?,
        total_size: row.try_get::<i64, _>("total_size")? as u64,
        part_size: row.try_get::<i64, _>("part_size")? as u64,
        total_parts: row.try_get::<i32, _>("total_parts")? as u32,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Repository for multipart upload sessions.
#[derive(Clone)]
pub struct UploadSessionRepo {
    pool: PgPool,
}

impl UploadSessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a freshly initialized session. The reserved code collides on
    /// its unique index if another session or video took it meanwhile.
    pub async fn create(&self, session: &UploadSession) -> StoreResult<UploadSession> {
        let row = sqlx::query(&format!(
            "INSERT INTO upload_sessions
             (id, upload_id, video_code, user_id, object_path, filename, content_type,
              title, total_size, part_size, total_parts, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session.id)
        .bind(&session.upload_id)
        .bind(&session.video_code)
        .bind(session.user_id)
        .bind(&session.object_path)
        .bind(&session.filename)
        .bind(&session.content_type)
        .bind(&session.title)
        .bind(session.total_size as i64)
        .bind(session.part_size as i64)
        .bind(session.total_parts as i32)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "upload session"))?;

        info!(upload_id = %session.upload_id, code = %session.video_code, "Created upload session");
        row_to_session(&row)
    }

    pub async fn get_by_upload_id(&self, upload_id: &str) -> StoreResult<UploadSession> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE upload_id = $1"
        ))
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("upload session {}", upload_id)))?;
        row_to_session(&row)
    }

    pub async fn delete(&self, upload_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM upload_sessions WHERE upload_id = $1")
            .bind(upload_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sessions past their expiry, for the reaper.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<UploadSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE expires_at < $1
             ORDER BY expires_at ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_session).collect()
    }

    /// Terminal step of a completed upload: create the `pending` Video and
    /// drop the session in one transaction. Object-store assembly has
    /// already happened outside any transaction.
    pub async fn promote_to_video(
        &self,
        upload_id: &str,
        new: NewVideo,
    ) -> StoreResult<Video> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM upload_sessions WHERE upload_id = $1")
            .bind(upload_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found(format!(
                "upload session {}",
                upload_id
            )));
        }

        let row = sqlx::query(
            "INSERT INTO videos (id, code, user_id, category_id, title, description, original_path, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
             RETURNING id",
        )
        .bind(new.id.0)
        .bind(&new.code)
        .bind(new.user_id)
        .bind(new.category_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.original_path)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "video code"))?;

        let video_id: Uuid = row.try_get("id")?;
        tx.commit().await?;

        info!(upload_id, video_id = %video_id, "Upload session promoted to video");

        // Re-read outside the transaction; the row just committed.
        let video = crate::video_repo::VideoRepo::new(self.pool.clone())
            .get(VideoId(video_id))
            .await?;
        Ok(video)
    }
}
