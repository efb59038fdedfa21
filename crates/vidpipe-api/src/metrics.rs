//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vidpipe_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vidpipe_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vidpipe_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "vidpipe_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "vidpipe_ws_connections_active";
    pub const WS_FRAMES_SENT: &str = "vidpipe_ws_frames_sent_total";

    // Pipeline metrics
    pub const JOBS_PUBLISHED_TOTAL: &str = "vidpipe_jobs_published_total";
    pub const JOBS_CLAIMED_TOTAL: &str = "vidpipe_jobs_claimed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vidpipe_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vidpipe_jobs_failed_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "vidpipe_jobs_dead_lettered_total";
    pub const STUCK_RECOVERIES_TOTAL: &str = "vidpipe_stuck_recoveries_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vidpipe_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a WebSocket connection.
pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record a progress frame forwarded to a client.
pub fn record_ws_frame_sent() {
    counter!(names::WS_FRAMES_SENT).increment(1);
}

/// Record a job published.
pub fn record_job_published(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_PUBLISHED_TOTAL, &labels).increment(1);
}

/// Record a worker claim.
pub fn record_job_claimed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_CLAIMED_TOTAL, &labels).increment(1);
}

/// Record a job completion.
pub fn record_job_completed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record a job failure.
pub fn record_job_failed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record a row landing in the dead-letter set.
pub fn record_job_dead_lettered(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_DEAD_LETTERED_TOTAL, &labels).increment(1);
}

/// Record a stuck-sweep recovery.
pub fn record_stuck_recovery(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::STUCK_RECOVERIES_TOTAL, &labels).increment(1);
}

/// Record a rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (collapse IDs).
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .unwrap()
    .replace_all(path, ":id");
    let path = regex_lite::Regex::new(r"/[0-9]+(/|$)")
        .unwrap()
        .replace_all(&path, "/:id$1");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/videos/550e8400-e29b-41d4-a716-446655440000"),
            "/api/videos/:id"
        );
        assert_eq!(sanitize_path("/api/reels/42"), "/api/reels/:id");
    }
}
