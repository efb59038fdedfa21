//! Pipeline scheduler configuration.

use std::time::Duration;

/// Thresholds and cadences for the background machinery.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fallback retry budget when the system setting is absent
    pub max_retries: u32,
    /// Stuck sweep period
    pub sweep_period: Duration,
    /// A transcode with no beat for this long is stuck
    pub stuck_transcode: Duration,
    /// A subtitle job with no beat for this long is stuck
    pub stuck_subtitle: Duration,
    /// A reel export with no beat for this long is stuck
    pub stuck_reel: Duration,
    /// Upload session lifetime
    pub session_ttl: Duration,
    /// Session reaper period
    pub reaper_period: Duration,
    /// Fallback multipart part size when the system setting is absent
    pub part_size: u64,
    /// Presigned part-URL lifetime
    pub presign_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: vidpipe_models::DEFAULT_MAX_RETRIES,
            sweep_period: Duration::from_secs(30),
            stuck_transcode: Duration::from_secs(60),
            stuck_subtitle: Duration::from_secs(600),
            stuck_reel: Duration::from_secs(900),
            session_ttl: Duration::from_secs(24 * 3600),
            reaper_period: Duration::from_secs(300),
            part_size: vidpipe_models::DEFAULT_PART_SIZE,
            presign_ttl: Duration::from_secs(vidpipe_models::DEFAULT_PRESIGN_TTL_SECS),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let secs = |name: &str, default: u64| {
            Duration::from_secs(
                std::env::var(name)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default),
            )
        };

        Self {
            max_retries: std::env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(vidpipe_models::DEFAULT_MAX_RETRIES),
            sweep_period: secs("STUCK_SWEEP_PERIOD", 30),
            stuck_transcode: secs("STUCK_TRANSCODE_SECS", 60),
            stuck_subtitle: secs("STUCK_SUBTITLE_SECS", 600),
            stuck_reel: secs("STUCK_REEL_SECS", 900),
            session_ttl: secs("UPLOAD_SESSION_TTL", 24 * 3600),
            reaper_period: secs("UPLOAD_REAPER_PERIOD", 300),
            part_size: std::env::var("UPLOAD_PART_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(vidpipe_models::DEFAULT_PART_SIZE),
            presign_ttl: secs("UPLOAD_PRESIGN_TTL", vidpipe_models::DEFAULT_PRESIGN_TTL_SECS),
        }
    }
}
