//! API routes.

use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::ads::record_impression;
use crate::handlers::queues::{purge_queue, queue_stats};
use crate::handlers::reels::{
    beat_reel, complete_reel, create_reel, delete_reel, export_reel, fail_reel, get_reel,
    list_reels, update_reel,
};
use crate::handlers::settings::{get_category, setting_audit, update_setting};
use crate::handlers::subtitles::{
    beat_subtitle, begin_stage, complete_subtitle, delete_subtitle, fail_subtitle,
    list_subtitles, report_detected, request_detect, request_transcribe, request_translate,
};
use crate::handlers::uploads::{abort_direct_upload, complete_direct_upload, init_direct_upload};
use crate::handlers::videos::{
    beat_video, claim_video, complete_video, delete_video, fail_video, get_video,
    get_video_by_code, list_dead_letter, list_videos, retry_video, update_video,
};
use crate::handlers::whitelist::{create_profile, delete_profile, list_profiles};
use crate::handlers::workers::{get_worker, list_workers};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;
use crate::ws::ws_progress;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_routes = Router::new()
        .route("/videos/uploads/direct/init", post(init_direct_upload))
        .route("/videos/uploads/direct/complete", post(complete_direct_upload))
        .route("/videos/uploads/direct/abort", delete(abort_direct_upload));

    let video_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/dlq", get(list_dead_letter))
        .route("/videos/code/:code", get(get_video_by_code))
        .route("/videos/:id", get(get_video))
        .route("/videos/:id", patch(update_video))
        .route("/videos/:id", delete(delete_video))
        .route("/videos/:id/retry", post(retry_video))
        // Worker callbacks
        .route("/videos/:id/claim", post(claim_video))
        .route("/videos/:id/beat", post(beat_video))
        .route("/videos/:id/complete", post(complete_video))
        .route("/videos/:id/fail", post(fail_video));

    let subtitle_routes = Router::new()
        .route("/videos/:id/subtitles", get(list_subtitles))
        .route("/videos/:id/subtitles/detect", post(request_detect))
        .route("/videos/:id/subtitles/transcribe", post(request_transcribe))
        .route("/videos/:id/subtitles/translate", post(request_translate))
        .route("/subtitles/:id", delete(delete_subtitle))
        // Worker callbacks
        .route("/subtitles/:id/begin", post(begin_stage))
        .route("/subtitles/:id/detected", post(report_detected))
        .route("/subtitles/:id/beat", post(beat_subtitle))
        .route("/subtitles/:id/complete", post(complete_subtitle))
        .route("/subtitles/:id/fail", post(fail_subtitle));

    let reel_routes = Router::new()
        .route("/reels", post(create_reel))
        .route("/reels", get(list_reels))
        .route("/reels/:id", get(get_reel))
        .route("/reels/:id", patch(update_reel))
        .route("/reels/:id", delete(delete_reel))
        .route("/reels/:id/export", post(export_reel))
        // Worker callbacks
        .route("/reels/:id/beat", post(beat_reel))
        .route("/reels/:id/complete", post(complete_reel))
        .route("/reels/:id/fail", post(fail_reel));

    let admin_routes = Router::new()
        .route("/queues/stats", get(queue_stats))
        .route("/queues/:kind/purge", post(purge_queue))
        .route("/workers", get(list_workers))
        .route("/workers/:worker_id", get(get_worker))
        .route("/settings/:category", get(get_category))
        .route("/settings/:category/:key", put(update_setting))
        .route("/settings/:category/:key/audit", get(setting_audit))
        .route("/whitelist", get(list_profiles))
        .route("/whitelist", post(create_profile))
        .route("/whitelist/:id", delete(delete_profile))
        .route("/ads/impressions", post(record_impression));

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(video_routes)
        .merge(subtitle_routes)
        .merge(reel_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let ws_routes = Router::new().route("/ws/progress/:video_id", get(ws_progress));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(tower_http::timeout::TimeoutLayer::new(state.config.request_timeout))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
