//! Health handlers and the handler module tree.

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

pub mod ads;
pub mod queues;
pub mod reels;
pub mod settings;
pub mod subtitles;
pub mod uploads;
pub mod videos;
pub mod whitelist;
pub mod workers;

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe. Kept deliberately cheap; dependency health shows up in
/// metrics, not here.
pub async fn ready() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}
