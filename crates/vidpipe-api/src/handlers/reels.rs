//! Reel handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vidpipe_models::{Reel, ReelId, Segment, VideoId};
use vidpipe_store::ReelOutputs;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReelRequest {
    pub video_id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_style")]
    pub style: String,
    /// Either a single segment...
    #[serde(default)]
    pub segment_start: Option<f64>,
    #[serde(default)]
    pub segment_end: Option<f64>,
    /// ...or an explicit list.
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
}

fn default_style() -> String {
    "letterbox".to_string()
}

impl CreateReelRequest {
    fn segments(&self) -> Result<Vec<Segment>, crate::error::ApiError> {
        match (&self.segments, self.segment_start, self.segment_end) {
            (Some(list), None, None) => Ok(list.clone()),
            (None, Some(start), Some(end)) => Ok(vec![Segment::new(start, end)]),
            _ => Err(crate::error::ApiError::invalid(
                "provide either segments[] or segment_start/segment_end",
            )),
        }
    }
}

/// Create a draft reel.
pub async fn create_reel(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateReelRequest>,
) -> ApiResult<Json<Reel>> {
    let segments = req.segments()?;
    let reel = state
        .reel_exporter
        .create(
            VideoId(req.video_id),
            user.user_id()?,
            &req.title,
            &req.style,
            segments,
        )
        .await?;
    Ok(Json(reel))
}

#[derive(Debug, Deserialize)]
pub struct ListReelsQuery {
    pub video_id: Uuid,
}

pub async fn list_reels(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListReelsQuery>,
) -> ApiResult<Json<Vec<Reel>>> {
    Ok(Json(
        state.reel_exporter.list_for_video(VideoId(query.video_id)).await?,
    ))
}

pub async fn get_reel(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Reel>> {
    Ok(Json(state.reel_exporter.get(ReelId(id)).await?))
}

#[derive(Debug, Serialize)]
pub struct ReelExportResponse {
    pub reel: Reel,
    pub queued: bool,
}

/// Request an export; re-export from `ready` is permitted.
pub async fn export_reel(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReelExportResponse>> {
    let reel = state.reel_exporter.request_export(ReelId(id)).await?;
    metrics::record_job_published("reel");
    Ok(Json(ReelExportResponse { reel, queued: true }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReelRequest {
    pub title: String,
}

pub async fn update_reel(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReelRequest>,
) -> ApiResult<Json<Reel>> {
    Ok(Json(
        state.reel_exporter.update_title(ReelId(id), &req.title).await?,
    ))
}

/// Delete a reel and its exported object.
pub async fn delete_reel(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.reel_exporter.delete(ReelId(id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Worker callbacks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReelCompleteRequest {
    pub output_path: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub size_bytes: u64,
}

pub async fn complete_reel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReelCompleteRequest>,
) -> ApiResult<Json<Reel>> {
    user.require_worker()?;
    let reel = state
        .reel_exporter
        .complete_export(
            ReelId(id),
            ReelOutputs {
                output_path: req.output_path,
                thumbnail_url: req.thumbnail_url,
                duration: req.duration,
                size_bytes: req.size_bytes,
            },
        )
        .await?;
    metrics::record_job_completed("reel");
    Ok(Json(reel))
}

#[derive(Debug, Deserialize)]
pub struct ReelFailRequest {
    pub error: String,
}

pub async fn fail_reel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReelFailRequest>,
) -> ApiResult<Json<Reel>> {
    user.require_worker()?;
    let reel = state.reel_exporter.fail_export(ReelId(id), &req.error).await?;
    metrics::record_job_failed("reel");
    Ok(Json(reel))
}

/// Worker liveness beat.
pub async fn beat_reel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_worker()?;
    let alive = state.reel_exporter.beat(ReelId(id)).await?;
    Ok(Json(serde_json::json!({ "alive": alive })))
}
