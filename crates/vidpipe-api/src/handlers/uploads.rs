//! Direct-upload handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vidpipe_models::CompletedPart;
use vidpipe_pipeline::PartUrl;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct InitDirectUploadRequest {
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    pub size: u64,
    #[validate(length(min = 1, max = 100))]
    pub content_type: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitDirectUploadResponse {
    pub upload_id: String,
    pub code: String,
    pub object_path: String,
    pub part_size: u64,
    pub total_parts: u32,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub part_urls: Vec<PartUrl>,
}

/// Initialize a multipart direct upload.
pub async fn init_direct_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<InitDirectUploadRequest>,
) -> ApiResult<Json<InitDirectUploadResponse>> {
    req.validate().map_err(|e| ApiError::invalid(e.to_string()))?;

    let initialized = state
        .uploads
        .init(
            user.user_id()?,
            &req.filename,
            req.size,
            &req.content_type,
            req.title.as_deref(),
        )
        .await?;

    let session = initialized.session;
    Ok(Json(InitDirectUploadResponse {
        upload_id: session.upload_id,
        code: session.video_code,
        object_path: session.object_path,
        part_size: session.part_size,
        total_parts: session.total_parts,
        expires_at: session.expires_at,
        part_urls: initialized.part_urls,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CompleteDirectUploadRequest {
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Serialize)]
pub struct CompleteDirectUploadResponse {
    pub video_id: vidpipe_models::VideoId,
    pub code: String,
    pub auto_enqueued: bool,
}

/// Complete the upload: assemble, create the Video, enqueue the transcode.
pub async fn complete_direct_upload(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<CompleteDirectUploadRequest>,
) -> ApiResult<Json<CompleteDirectUploadResponse>> {
    let completed = state.uploads.complete(&req.upload_id, &req.parts).await?;

    crate::metrics::record_job_published("transcode");
    Ok(Json(CompleteDirectUploadResponse {
        video_id: completed.video.id,
        code: completed.video.code,
        auto_enqueued: completed.auto_enqueued,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AbortDirectUploadRequest {
    pub upload_id: String,
}

/// Abort a session and release the object-store upload.
pub async fn abort_direct_upload(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<AbortDirectUploadRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.uploads.abort(&req.upload_id).await?;
    Ok(Json(serde_json::json!({})))
}
