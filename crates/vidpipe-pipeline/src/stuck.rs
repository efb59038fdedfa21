//! Background sweeper for stuck jobs.
//!
//! The single authority for unilaterally failing a job without worker input.
//! One loop iterates every job kind on a fixed cadence; each pass is
//! idempotent, so re-running over unchanged data changes nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use vidpipe_queue::{JobKind, JobQueue, ReelExportJob, SubtitleJob};
use vidpipe_store::{ReelRepo, SubtitleRepo, VideoRepo};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::subtitle::SubtitlePipeline;
use crate::video::VideoPipeline;

/// Per-pass counts, logged once per sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub transcode_failed: u32,
    pub subtitle_failed: u32,
    pub reel_failed: u32,
}

impl SweepReport {
    pub fn total(&self) -> u32 {
        self.transcode_failed + self.subtitle_failed + self.reel_failed
    }
}

/// Stuck-job detector service.
pub struct StuckJobDetector {
    videos: VideoRepo,
    subtitles: SubtitleRepo,
    reels: ReelRepo,
    video_pipeline: VideoPipeline,
    queue: Arc<JobQueue>,
    config: PipelineConfig,
    enabled: bool,
}

impl StuckJobDetector {
    pub fn new(
        videos: VideoRepo,
        subtitles: SubtitleRepo,
        reels: ReelRepo,
        video_pipeline: VideoPipeline,
        queue: Arc<JobQueue>,
        config: PipelineConfig,
    ) -> Self {
        let enabled = std::env::var("ENABLE_STUCK_DETECTION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            videos,
            subtitles,
            reels,
            video_pipeline,
            queue,
            config,
            enabled,
        }
    }

    /// Run the detection loop until the shutdown signal flips.
    ///
    /// A pass that overruns the period is cut off and skipped, never
    /// overlapped.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if !self.enabled {
            info!("Stuck-job detection is disabled");
            return;
        }

        info!(
            "Starting stuck-job detector (period: {:?})",
            self.config.sweep_period
        );

        let mut ticker = interval(self.config.sweep_period);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Stuck-job detector stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    match tokio::time::timeout(self.config.sweep_period, self.sweep_once()).await {
                        Ok(Ok(report)) => {
                            info!(
                                transcode = report.transcode_failed,
                                subtitle = report.subtitle_failed,
                                reel = report.reel_failed,
                                "Stuck sweep complete"
                            );
                        }
                        Ok(Err(e)) => error!("Stuck sweep error: {}", e),
                        Err(_) => warn!("Stuck sweep missed its deadline, skipping"),
                    }
                }
            }
        }
    }

    /// One detection pass across every job kind.
    pub async fn sweep_once(&self) -> PipelineResult<SweepReport> {
        let mut report = SweepReport::default();
        let now = Utc::now();

        // Transcodes: fail through the video pipeline so retry accounting
        // and message purging follow the same path workers use.
        let threshold = now - chrono::Duration::seconds(self.config.stuck_transcode.as_secs() as i64);
        for video in self.videos.list_stuck_processing(threshold).await? {
            let error = format!(
                "stuck: no progress for {}s",
                self.config.stuck_transcode.as_secs()
            );
            warn!(
                video_id = %video.id,
                started_at = ?video.processing_started_at,
                "Detected stuck transcode"
            );
            match self
                .video_pipeline
                .fail(video.id, &error, None, "transcode")
                .await
            {
                Ok(_) => report.transcode_failed += 1,
                Err(e) => error!(video_id = %video.id, "Failed to recover stuck transcode: {}", e),
            }
        }

        // Subtitles.
        let threshold = now - chrono::Duration::seconds(self.config.stuck_subtitle.as_secs() as i64);
        for subtitle in self.subtitles.list_stuck(threshold).await? {
            let error = format!(
                "stuck: no progress for {}s",
                self.config.stuck_subtitle.as_secs()
            );
            warn!(subtitle_id = %subtitle.id, "Detected stuck subtitle job");

            let stage = SubtitlePipeline::stage_for_status(subtitle.status);
            match self.subtitles.fail(subtitle.id, &error).await {
                Ok(_) => {
                    report.subtitle_failed += 1;
                    if let Some(stage) = stage {
                        let key = SubtitleJob::new(
                            subtitle.id,
                            subtitle.video_id,
                            &subtitle.language,
                            stage,
                        )
                        .idempotency_key();
                        if let Err(e) = self.queue.purge(JobKind::Subtitle, &key).await {
                            warn!(subtitle_id = %subtitle.id, "Purge failed: {}", e);
                        }
                    }
                }
                Err(e) => error!(subtitle_id = %subtitle.id, "Failed to recover stuck subtitle: {}", e),
            }
        }

        // Reels.
        let threshold = now - chrono::Duration::seconds(self.config.stuck_reel.as_secs() as i64);
        for reel in self.reels.list_stuck(threshold).await? {
            let error = format!(
                "stuck: no progress for {}s",
                self.config.stuck_reel.as_secs()
            );
            warn!(reel_id = %reel.id, "Detected stuck reel export");

            match self.reels.fail_export(reel.id, &error).await {
                Ok(_) => {
                    report.reel_failed += 1;
                    let key = ReelExportJob::key_for(reel.id);
                    if let Err(e) = self.queue.purge(JobKind::Reel, &key).await {
                        warn!(reel_id = %reel.id, "Purge failed: {}", e);
                    }
                }
                Err(e) => error!(reel_id = %reel.id, "Failed to recover stuck reel: {}", e),
            }
        }

        Ok(report)
    }
}
