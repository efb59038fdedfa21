//! Subtitle handlers: client requests and worker callbacks.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use vidpipe_models::{Subtitle, SubtitleId, VideoId};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// List a video's subtitle tracks.
pub async fn list_subtitles(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Subtitle>>> {
    Ok(Json(
        state.subtitle_pipeline.list_for_video(VideoId(video_id)).await?,
    ))
}

/// Start language detection for the original track.
pub async fn request_detect(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<Subtitle>> {
    let subtitle = state.subtitle_pipeline.request_detect(VideoId(video_id)).await?;
    metrics::record_job_published("subtitle");
    Ok(Json(subtitle))
}

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub subtitle_id: Uuid,
}

/// Confirm the detected language and start transcription.
pub async fn request_transcribe(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(_video_id): Path<Uuid>,
    Json(req): Json<TranscribeRequest>,
) -> ApiResult<Json<Subtitle>> {
    let subtitle = state
        .subtitle_pipeline
        .request_transcribe(SubtitleId(req.subtitle_id))
        .await?;
    metrics::record_job_published("subtitle");
    Ok(Json(subtitle))
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub target_languages: Vec<String>,
}

/// Create translated tracks; the original must be ready.
pub async fn request_translate(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(video_id): Path<Uuid>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<Json<Vec<Subtitle>>> {
    let subtitles = state
        .subtitle_pipeline
        .request_translate(VideoId(video_id), &req.target_languages)
        .await?;
    metrics::record_job_published("subtitle");
    Ok(Json(subtitles))
}

/// Delete a track (and its file). Re-requesting the language creates a fresh
/// row.
pub async fn delete_subtitle(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.subtitle_pipeline.delete(SubtitleId(id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Worker callbacks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubtitleStageBegin {
    pub stage: String,
}

/// Worker picked up a subtitle job.
pub async fn begin_stage(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SubtitleStageBegin>,
) -> ApiResult<Json<Subtitle>> {
    user.require_worker()?;
    let id = SubtitleId(id);
    let subtitle = match req.stage.as_str() {
        "detect" => state.subtitle_pipeline.begin_detect(id).await?,
        "transcribe" => state.subtitle_pipeline.begin_transcribe(id).await?,
        "translate" => state.subtitle_pipeline.begin_translate(id).await?,
        other => {
            return Err(crate::error::ApiError::invalid(format!(
                "unknown stage: {}",
                other
            )))
        }
    };
    metrics::record_job_claimed("subtitle");
    Ok(Json(subtitle))
}

#[derive(Debug, Deserialize)]
pub struct DetectedRequest {
    pub language: String,
}

/// Worker reports the detected language.
pub async fn report_detected(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DetectedRequest>,
) -> ApiResult<Json<Subtitle>> {
    user.require_worker()?;
    Ok(Json(
        state
            .subtitle_pipeline
            .report_detected(SubtitleId(id), &req.language)
            .await?,
    ))
}

/// Worker liveness beat.
pub async fn beat_subtitle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_worker()?;
    let alive = state.subtitle_pipeline.beat(SubtitleId(id)).await?;
    Ok(Json(serde_json::json!({ "alive": alive })))
}

#[derive(Debug, Deserialize)]
pub struct SubtitleCompleteRequest {
    pub srt_path: String,
}

/// Worker completion callback.
pub async fn complete_subtitle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SubtitleCompleteRequest>,
) -> ApiResult<Json<Subtitle>> {
    user.require_worker()?;
    let subtitle = state
        .subtitle_pipeline
        .complete(SubtitleId(id), &req.srt_path)
        .await?;
    metrics::record_job_completed("subtitle");
    Ok(Json(subtitle))
}

#[derive(Debug, Deserialize)]
pub struct SubtitleFailRequest {
    pub error: String,
}

/// Worker failure callback.
pub async fn fail_subtitle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SubtitleFailRequest>,
) -> ApiResult<Json<Subtitle>> {
    user.require_worker()?;
    let subtitle = state.subtitle_pipeline.fail(SubtitleId(id), &req.error).await?;
    metrics::record_job_failed("subtitle");
    Ok(Json(subtitle))
}
