//! Queue admin handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use vidpipe_queue::JobKind;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Per-kind stream and DLQ depths: `{transcode, subtitle, warmcache, reel}`.
pub async fn queue_stats(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.queue.stats().await?;
    Ok(Json(serde_json::to_value(stats).map_err(|e| ApiError::internal(e.to_string()))?))
}

fn parse_kind(kind: &str) -> Result<JobKind, ApiError> {
    match kind {
        "transcode" => Ok(JobKind::Transcode),
        "subtitle" => Ok(JobKind::Subtitle),
        "reel" => Ok(JobKind::Reel),
        "warmcache" => Ok(JobKind::WarmCache),
        other => Err(ApiError::invalid(format!("unknown queue kind: {}", other))),
    }
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub idempotency_key: String,
}

/// Purge every in-flight message for one idempotency key. Admin only.
pub async fn purge_queue(
    State(state): State<AppState>,
    user: AuthUser,
    Path(kind): Path<String>,
    Json(req): Json<PurgeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;
    let kind = parse_kind(&kind)?;
    let purged = state.queue.purge(kind, &req.idempotency_key).await?;
    Ok(Json(json!({ "purged": purged })))
}
