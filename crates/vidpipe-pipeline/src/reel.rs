//! Reel exporter coordinator.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use vidpipe_models::{validate_segments, Reel, ReelId, Segment, VideoId};
use vidpipe_queue::{JobKind, JobQueue, QueueError, QueueJob, ReelExportJob};
use vidpipe_storage::ObjectStore;
use vidpipe_store::{NewReel, ReelOutputs, ReelRepo, VideoRepo};

use crate::error::{PipelineError, PipelineResult};

/// Coordinator for reel drafts and exports.
#[derive(Clone)]
pub struct ReelExporter {
    reels: ReelRepo,
    videos: VideoRepo,
    queue: Arc<JobQueue>,
    storage: ObjectStore,
}

impl ReelExporter {
    pub fn new(
        reels: ReelRepo,
        videos: VideoRepo,
        queue: Arc<JobQueue>,
        storage: ObjectStore,
    ) -> Self {
        Self {
            reels,
            videos,
            queue,
            storage,
        }
    }

    /// Create a draft. Segment constraints are enforced here, before any row
    /// exists: at most 10 segments, 60 seconds total, end after start.
    pub async fn create(
        &self,
        video_id: VideoId,
        user_id: Uuid,
        title: &str,
        style: &str,
        segments: Vec<Segment>,
    ) -> PipelineResult<Reel> {
        validate_segments(&segments)?;

        // The referenced video must exist; its pipeline state is irrelevant
        // for drafting.
        self.videos.get(video_id).await?;

        let reel = self
            .reels
            .create(NewReel {
                id: ReelId::new(),
                video_id,
                user_id,
                title: title.to_string(),
                style: style.to_string(),
                segments,
            })
            .await?;
        Ok(reel)
    }

    /// Request an export. Permitted from any state except `exporting`; a
    /// ready reel re-exports. Publishes with idempotency-key = reel id, so a
    /// back-to-back duplicate request cannot double-publish.
    pub async fn request_export(&self, id: ReelId) -> PipelineResult<Reel> {
        let reel = self.reels.begin_export(id).await?;
        let video = self.videos.get(reel.video_id).await?;

        let job = QueueJob::ReelExport(ReelExportJob::new(reel.id, reel.video_id, &video.code));
        match self.queue.publish(&job).await {
            Ok(_) => {}
            Err(QueueError::Duplicate(key)) => {
                warn!(reel_id = %id, key = %key, "Reel export already in flight");
            }
            Err(e) => return Err(e.into()),
        }

        info!(reel_id = %id, "Reel export requested");
        Ok(reel)
    }

    /// Worker liveness beat. Returns false once the row has left
    /// `exporting` and the worker should stop.
    pub async fn beat(&self, id: ReelId) -> PipelineResult<bool> {
        Ok(self.reels.update_processing_timestamp(id).await?)
    }

    /// Worker completion callback: `ready`, with exactly `output_path` set.
    pub async fn complete_export(&self, id: ReelId, outputs: ReelOutputs) -> PipelineResult<Reel> {
        let reel = self.reels.complete_export(id, &outputs).await?;
        self.clear_window(id).await;
        Ok(reel)
    }

    /// Worker failure callback: `failed`, with exactly `export_error` set.
    pub async fn fail_export(&self, id: ReelId, error: &str) -> PipelineResult<Reel> {
        let reel = self.reels.fail_export(id, error).await?;
        self.clear_window(id).await;
        Ok(reel)
    }

    pub async fn get(&self, id: ReelId) -> PipelineResult<Reel> {
        Ok(self.reels.get(id).await?)
    }

    pub async fn list_for_video(&self, video_id: VideoId) -> PipelineResult<Vec<Reel>> {
        Ok(self.reels.list_by_video(video_id).await?)
    }

    pub async fn update_title(&self, id: ReelId, title: &str) -> PipelineResult<Reel> {
        Ok(self.reels.update_title(id, title).await?)
    }

    /// Delete the reel and its exported object: row first, then the object,
    /// then any lingering queue message.
    pub async fn delete(&self, id: ReelId) -> PipelineResult<()> {
        let reel = self.reels.delete(id).await?;

        if let Some(output_path) = &reel.output_path {
            if let Err(e) = self.storage.delete(output_path).await {
                warn!(reel_id = %id, "Failed to delete reel object: {}", e);
            }
        }

        let _ = self.queue.purge(JobKind::Reel, &ReelExportJob::key_for(id)).await;

        Ok(())
    }

    async fn clear_window(&self, id: ReelId) {
        if let Err(e) = self.queue.clear_dedup(&ReelExportJob::key_for(id)).await {
            warn!(reel_id = %id, "Failed to clear dedup window: {}", e);
        }
    }
}
