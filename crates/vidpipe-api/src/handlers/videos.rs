//! Video handlers: listing, lifecycle admin, and worker callbacks.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use vidpipe_models::{ErrorRecord, Patch, TranscodeOutputs, Video, VideoId, VideoStatus};
use vidpipe_storage::{folder_prefix, ObjectKind};
use vidpipe_store::{VideoFilter, VideoMetaPatch, VideoSort};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::pagination::{Page, PageParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<Uuid>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// List videos with server-side filters and one total count.
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListVideosQuery>,
) -> ApiResult<Json<Page<Video>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<VideoStatus>())
        .transpose()
        .map_err(ApiError::invalid)?;

    let sort = match query.sort.as_deref() {
        None | Some("created_desc") => VideoSort::CreatedDesc,
        Some("created_asc") => VideoSort::CreatedAsc,
        Some("updated_desc") => VideoSort::UpdatedDesc,
        Some("title") => VideoSort::Title,
        Some(other) => return Err(ApiError::invalid(format!("unknown sort: {}", other))),
    };

    let page = PageParams {
        offset: query.offset,
        limit: query.limit,
    };
    let filter = VideoFilter {
        search: query.search,
        status,
        category_id: query.category,
        // Non-admin callers only see their own library.
        user_id: match user.role {
            crate::auth::Role::Admin => None,
            _ => Some(user.user_id()?),
        },
        created_after: query.from,
        created_before: query.to,
        sort,
        limit: page.limit(),
        offset: page.offset(),
    };

    let page = state.videos.list_with_filters(&filter).await?;
    Ok(Json(Page::new(
        page.videos,
        page.total,
        filter.offset,
        filter.limit,
    )))
}

pub async fn get_video(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Video>> {
    Ok(Json(state.videos.get(VideoId(id)).await?))
}

/// Look a video up by its public code, the identifier CDN paths and share
/// URLs carry.
pub async fn get_video_by_code(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<Video>> {
    if !vidpipe_pipeline::is_valid_code(&code) {
        return Err(ApiError::invalid("malformed video code"));
    }
    Ok(Json(state.videos.get_by_code(&code).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    /// Tagged patch per field: `{"op":"keep"}`, `{"op":"set","value":…}`,
    /// `{"op":"clear"}`. Omitted fields keep.
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub category_id: Patch<Uuid>,
}

/// Patch video metadata.
pub async fn update_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVideoRequest>,
) -> ApiResult<Json<Video>> {
    let video = state.videos.get(VideoId(id)).await?;
    if user.role != crate::auth::Role::Admin && video.user_id != user.user_id()? {
        return Err(ApiError::not_found(format!("video {}", id)));
    }

    let patch = VideoMetaPatch {
        title: req.title,
        description: req.description,
        category_id: req.category_id,
    };
    Ok(Json(state.videos.update_meta(video.id, &patch).await?))
}

/// Dead-letter queue listing with full error histories.
pub async fn list_dead_letter(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<Video>>> {
    user.require_admin()?;
    let result = state.videos.list_dead_letter(page.limit(), page.offset()).await?;
    Ok(Json(Page::new(
        result.videos,
        result.total,
        page.offset(),
        page.limit(),
    )))
}

/// Admin retry from `failed` or `dead_letter`.
pub async fn retry_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Video>)> {
    user.require_admin()?;
    let video = state.video_pipeline.retry(VideoId(id)).await?;
    metrics::record_job_published("transcode");
    Ok((StatusCode::ACCEPTED, Json(video)))
}

/// Delete a video row and its object-store folders, objects first is not
/// required here: the row is authoritative, so it goes first and the folder
/// cleanup is best-effort.
pub async fn delete_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let video = state.videos.get(VideoId(id)).await?;
    if user.role != crate::auth::Role::Admin && video.user_id != user.user_id()? {
        return Err(ApiError::not_found(format!("video {}", id)));
    }

    state.videos.delete(video.id).await?;

    for kind in [
        ObjectKind::Hls,
        ObjectKind::HlsH264,
        ObjectKind::Gallery,
        ObjectKind::Audio,
        ObjectKind::Subs,
        ObjectKind::Reels,
        ObjectKind::Uploads,
    ] {
        let prefix = folder_prefix(kind, &video.code);
        if let Err(e) = state.storage.delete_folder(&prefix).await {
            tracing::warn!(video_id = %id, prefix, "Folder cleanup failed: {}", e);
        }
    }

    info!(video_id = %id, "Video deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Worker callbacks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub worker_id: String,
}

/// Worker claim: queued → processing, 409 when the state advanced.
pub async fn claim_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<Json<Video>> {
    user.require_worker()?;
    let video = state.video_pipeline.claim(VideoId(id), &req.worker_id).await?;
    metrics::record_job_claimed("transcode");
    Ok(Json(video))
}

/// Worker progress beat. `alive: false` tells the worker to stop.
pub async fn beat_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_worker()?;
    let alive = state.video_pipeline.beat(VideoId(id)).await?;
    Ok(Json(serde_json::json!({ "alive": alive })))
}

/// Worker completion callback.
pub async fn complete_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(outputs): Json<TranscodeOutputs>,
) -> ApiResult<Json<Video>> {
    user.require_worker()?;
    let video = state.video_pipeline.complete(VideoId(id), &outputs).await?;
    metrics::record_job_completed("transcode");
    Ok(Json(video))
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    /// Non-fatal: append to history without failing the row.
    #[serde(default)]
    pub warning: bool,
}

/// Worker failure callback (fatal or advisory).
pub async fn fail_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<FailRequest>,
) -> ApiResult<Json<Video>> {
    user.require_worker()?;
    let stage = req.stage.as_deref().unwrap_or("transcode");

    if req.warning {
        let video = state.videos.get(VideoId(id)).await?;
        let mut record = ErrorRecord::new(video.retry_count, &req.error, stage);
        if let Some(w) = &req.worker_id {
            record = record.with_worker(w);
        }
        state.video_pipeline.report_warning(video.id, &record).await?;
        return Ok(Json(video));
    }

    let video = state
        .video_pipeline
        .fail(VideoId(id), &req.error, req.worker_id.as_deref(), stage)
        .await?;

    metrics::record_job_failed("transcode");
    if video.status == VideoStatus::DeadLetter {
        metrics::record_job_dead_lettered("transcode");
    }
    Ok(Json(video))
}
