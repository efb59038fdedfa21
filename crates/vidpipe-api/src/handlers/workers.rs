//! Worker registry handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vidpipe_models::{WorkerPresence, WorkerSummary};
use vidpipe_queue::OnlineWorkers;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OnlineWorkersResponse {
    pub workers: Vec<WorkerPresence>,
    pub summary: WorkerSummary,
}

impl From<OnlineWorkers> for OnlineWorkersResponse {
    fn from(online: OnlineWorkers) -> Self {
        Self {
            workers: online.workers,
            summary: online.summary,
        }
    }
}

/// Every worker with a live heartbeat, plus the aggregate. Derived from the
/// KV view: eventually consistent, never used for assignment.
pub async fn list_workers(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<OnlineWorkersResponse>> {
    let online = state.registry.list_online().await?;
    Ok(Json(online.into()))
}

pub async fn get_worker(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(worker_id): Path<String>,
) -> ApiResult<Json<WorkerPresence>> {
    state
        .registry
        .get(&worker_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("worker {}", worker_id)))
}
