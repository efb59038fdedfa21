//! Video pipeline coordinator.
//!
//! Owns the pending → queued → processing → ready/failed/dead_letter walk.
//! The queue applies retry delay via nak on the bus; this coordinator only
//! decides state.

use std::sync::Arc;

use tracing::{info, warn};

use vidpipe_models::{settings::keys, ErrorRecord, TranscodeOutputs, Video, VideoId};
use vidpipe_queue::{JobKind, JobQueue, QueueError, QueueJob, TranscodeJob};
use vidpipe_store::{ClaimOutcome, SettingsRepo, VideoRepo};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Coordinator for the video state machine.
#[derive(Clone)]
pub struct VideoPipeline {
    videos: VideoRepo,
    settings: SettingsRepo,
    queue: Arc<JobQueue>,
    config: PipelineConfig,
}

impl VideoPipeline {
    pub fn new(
        videos: VideoRepo,
        settings: SettingsRepo,
        queue: Arc<JobQueue>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            videos,
            settings,
            queue,
            config,
        }
    }

    /// Retry budget: the system setting when present, the config fallback
    /// otherwise.
    pub async fn max_retries(&self) -> PipelineResult<u32> {
        let value = self
            .settings
            .get_i64_or(keys::PIPELINE, keys::MAX_RETRIES, self.config.max_retries as i64)
            .await?;
        Ok(value.max(1) as u32)
    }

    /// Publish the transcode job and advance `pending → queued`.
    ///
    /// A duplicate publish means a message for this video is already in
    /// flight; the row is still advanced so state converges with the bus.
    pub async fn enqueue(&self, id: VideoId) -> PipelineResult<Video> {
        let video = self.videos.get(id).await?;

        let job = QueueJob::Transcode(TranscodeJob::new(video.id, &video.code));
        match self.queue.publish(&job).await {
            Ok(_) => {}
            Err(QueueError::Duplicate(key)) => {
                warn!(video_id = %id, key = %key, "Transcode already in flight");
            }
            Err(e) => return Err(e.into()),
        }

        let video = self.videos.mark_queued(id).await?;
        Ok(video)
    }

    /// Worker claim: the only `queued → processing` path. A repeat claim by
    /// the same worker is a no-op; by a different worker a conflict, which
    /// tells the worker its redelivered message is stale.
    pub async fn claim(&self, id: VideoId, worker_id: &str) -> PipelineResult<Video> {
        let (video, outcome) = self.videos.claim(id, worker_id).await?;
        if outcome == ClaimOutcome::AlreadyOwned {
            info!(video_id = %id, worker_id, "Repeat claim, no-op");
        }
        Ok(video)
    }

    /// Worker liveness beat. Returns false when the row has moved on and the
    /// worker should stop.
    pub async fn beat(&self, id: VideoId) -> PipelineResult<bool> {
        Ok(self.videos.update_processing_timestamp(id).await?)
    }

    /// Worker completion callback. Idempotent against redelivery.
    pub async fn complete(&self, id: VideoId, outputs: &TranscodeOutputs) -> PipelineResult<Video> {
        let video = self.videos.complete(id, outputs).await?;

        // Terminal outcome: release the publish window.
        if let Err(e) = self.queue.clear_dedup(&TranscodeJob::key_for(id)).await {
            warn!(video_id = %id, "Failed to clear dedup window: {}", e);
        }

        Ok(video)
    }

    /// Worker failure callback (or the stuck sweeper acting as one).
    pub async fn fail(
        &self,
        id: VideoId,
        error: &str,
        worker_id: Option<&str>,
        stage: &str,
    ) -> PipelineResult<Video> {
        let max_retries = self.max_retries().await?;
        let video = self
            .videos
            .mark_failed(id, error, worker_id, stage, max_retries)
            .await?;

        // Drop any lingering message so a retry publish is not deduplicated
        // against a corpse.
        if let Err(e) = self.queue.purge(JobKind::Transcode, &TranscodeJob::key_for(id)).await {
            warn!(video_id = %id, "Failed to purge transcode message: {}", e);
        }

        Ok(video)
    }

    /// Non-fatal problem report: history only, no state change.
    pub async fn report_warning(&self, id: VideoId, record: &ErrorRecord) -> PipelineResult<()> {
        Ok(self.videos.append_error_history(id, record).await?)
    }

    /// Admin retry. A `failed` row keeps its retry counter so repeated
    /// crashes still reach the dead-letter budget; a `dead_letter` row gets
    /// the explicit full reset. Either way the job is republished.
    pub async fn retry(&self, id: VideoId) -> PipelineResult<Video> {
        let video = self.videos.get(id).await?;
        match video.status {
            vidpipe_models::VideoStatus::Failed => {
                self.videos.requeue_for_retry(id).await?;
            }
            vidpipe_models::VideoStatus::DeadLetter => {
                self.videos.reset_for_retry(id).await?;
            }
            other => {
                return Err(PipelineError::conflict(format!(
                    "video {} is {}, not retryable",
                    id, other
                )));
            }
        }

        let video = self.enqueue(id).await?;
        info!(video_id = %id, "Admin retry enqueued");
        Ok(video)
    }
}
