//! Ad impression handlers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use vidpipe_models::{AdImpression, VideoId};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordImpressionRequest {
    pub video_id: Uuid,
    pub placement: String,
    #[serde(default)]
    pub watched_ms: u64,
    #[serde(default)]
    pub completed: bool,
}

pub async fn record_impression(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RecordImpressionRequest>,
) -> ApiResult<Json<AdImpression>> {
    let impression = state
        .impressions
        .record(
            VideoId(req.video_id),
            user.user_id().ok(),
            &req.placement,
            req.watched_ms,
            req.completed,
        )
        .await?;
    Ok(Json(impression))
}
