//! Subtitle pipeline coordinator.
//!
//! Two sub-pipelines per video: the original track (detect, then transcribe)
//! and per-language translated tracks. `(video_id, language)` uniqueness is
//! the store's constraint; retrying a translated track is delete-then-create.

use std::sync::Arc;

use tracing::{info, warn};

use vidpipe_models::{
    Subtitle, SubtitleId, SubtitleKind, SubtitleStatus, VideoId, VideoStatus,
};
use vidpipe_queue::{JobKind, JobQueue, QueueError, QueueJob, SubtitleJob, SubtitleStage};
use vidpipe_storage::ObjectStore;
use vidpipe_store::{SubtitleRepo, VideoRepo};

use crate::error::{PipelineError, PipelineResult};

/// Language placeholder for an original track before detection ran.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Coordinator for subtitle tracks.
#[derive(Clone)]
pub struct SubtitlePipeline {
    subtitles: SubtitleRepo,
    videos: VideoRepo,
    queue: Arc<JobQueue>,
    storage: ObjectStore,
}

impl SubtitlePipeline {
    pub fn new(
        subtitles: SubtitleRepo,
        videos: VideoRepo,
        queue: Arc<JobQueue>,
        storage: ObjectStore,
    ) -> Self {
        Self {
            subtitles,
            videos,
            queue,
            storage,
        }
    }

    /// Guard: subtitle work only makes sense on a transcoded video.
    async fn require_ready_video(&self, video_id: VideoId) -> PipelineResult<()> {
        let video = self.videos.get(video_id).await?;
        if video.status != VideoStatus::Ready {
            return Err(PipelineError::conflict(format!(
                "video {} is {}, subtitles need a ready video",
                video_id, video.status
            )));
        }
        Ok(())
    }

    async fn publish(&self, job: SubtitleJob) -> PipelineResult<()> {
        match self.queue.publish(&QueueJob::Subtitle(job)).await {
            Ok(_) => Ok(()),
            Err(QueueError::Duplicate(key)) => {
                warn!(key = %key, "Subtitle job already in flight");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the original track: create the row with a placeholder language,
    /// publish the detect job, and advance to `queued`.
    pub async fn request_detect(&self, video_id: VideoId) -> PipelineResult<Subtitle> {
        self.require_ready_video(video_id).await?;

        if self.subtitles.get_original(video_id).await?.is_some() {
            return Err(PipelineError::conflict(format!(
                "video {} already has an original track",
                video_id
            )));
        }

        let subtitle = self
            .subtitles
            .create(
                SubtitleId::new(),
                video_id,
                UNDETERMINED_LANGUAGE,
                SubtitleKind::Original,
            )
            .await?;

        self.publish(SubtitleJob::new(
            subtitle.id,
            video_id,
            &subtitle.language,
            SubtitleStage::Detect,
        ))
        .await?;

        let subtitle = self
            .subtitles
            .transition(subtitle.id, &[SubtitleStatus::Pending], SubtitleStatus::Queued)
            .await?;

        info!(video_id = %video_id, subtitle_id = %subtitle.id, "Language detection requested");
        Ok(subtitle)
    }

    /// Worker picked up the detect job.
    pub async fn begin_detect(&self, id: SubtitleId) -> PipelineResult<Subtitle> {
        Ok(self
            .subtitles
            .transition(id, &[SubtitleStatus::Queued], SubtitleStatus::Detecting)
            .await?)
    }

    /// Worker reports the detected language; the row waits in `detected`
    /// for client confirmation.
    pub async fn report_detected(&self, id: SubtitleId, language: &str) -> PipelineResult<Subtitle> {
        Ok(self.subtitles.set_detected(id, language).await?)
    }

    /// Client confirmed the language: publish the transcription job. The row
    /// stays `detected` until the worker begins.
    pub async fn request_transcribe(&self, id: SubtitleId) -> PipelineResult<Subtitle> {
        let subtitle = self.subtitles.get(id).await?;
        if subtitle.status != SubtitleStatus::Detected {
            return Err(PipelineError::conflict(format!(
                "subtitle {} is {}, not detected",
                id, subtitle.status
            )));
        }

        self.publish(SubtitleJob::new(
            subtitle.id,
            subtitle.video_id,
            &subtitle.language,
            SubtitleStage::Transcribe,
        ))
        .await?;

        info!(subtitle_id = %id, "Transcription requested");
        Ok(subtitle)
    }

    /// Worker picked up the transcribe job.
    pub async fn begin_transcribe(&self, id: SubtitleId) -> PipelineResult<Subtitle> {
        Ok(self
            .subtitles
            .transition(id, &[SubtitleStatus::Detected], SubtitleStatus::Processing)
            .await?)
    }

    /// Create translated tracks for each target language and publish their
    /// jobs. Precondition: the original track is ready.
    pub async fn request_translate(
        &self,
        video_id: VideoId,
        target_languages: &[String],
    ) -> PipelineResult<Vec<Subtitle>> {
        if target_languages.is_empty() {
            return Err(PipelineError::invalid("no target languages given"));
        }

        let original = self
            .subtitles
            .get_original(video_id)
            .await?
            .ok_or_else(|| {
                PipelineError::conflict(format!("video {} has no original track", video_id))
            })?;
        if original.status != SubtitleStatus::Ready {
            return Err(PipelineError::conflict(format!(
                "original track is {}, translation needs ready",
                original.status
            )));
        }

        let mut created = Vec::with_capacity(target_languages.len());
        for language in target_languages {
            if language == &original.language {
                return Err(PipelineError::invalid(format!(
                    "target language {} equals the original",
                    language
                )));
            }

            let subtitle = self
                .subtitles
                .create(SubtitleId::new(), video_id, language, SubtitleKind::Translated)
                .await?;

            self.publish(SubtitleJob::new(
                subtitle.id,
                video_id,
                language,
                SubtitleStage::Translate,
            ))
            .await?;

            let subtitle = self
                .subtitles
                .transition(subtitle.id, &[SubtitleStatus::Pending], SubtitleStatus::Queued)
                .await?;
            created.push(subtitle);
        }

        info!(
            video_id = %video_id,
            languages = ?target_languages,
            "Translation requested"
        );
        Ok(created)
    }

    /// Worker picked up a translate job.
    pub async fn begin_translate(&self, id: SubtitleId) -> PipelineResult<Subtitle> {
        Ok(self
            .subtitles
            .transition(id, &[SubtitleStatus::Queued], SubtitleStatus::Translating)
            .await?)
    }

    /// Worker liveness beat for active tracks.
    pub async fn beat(&self, id: SubtitleId) -> PipelineResult<bool> {
        Ok(self.subtitles.update_processing_timestamp(id).await?)
    }

    /// Worker completion callback. Clears the publish window for the stage
    /// that just finished.
    pub async fn complete(&self, id: SubtitleId, srt_path: &str) -> PipelineResult<Subtitle> {
        let before = self.subtitles.get(id).await?;
        let subtitle = self.subtitles.complete(id, srt_path).await?;
        self.clear_stage_window(&before).await;
        Ok(subtitle)
    }

    /// Worker failure callback.
    pub async fn fail(&self, id: SubtitleId, error: &str) -> PipelineResult<Subtitle> {
        let before = self.subtitles.get(id).await?;
        let subtitle = self.subtitles.fail(id, error).await?;
        self.clear_stage_window(&before).await;
        Ok(subtitle)
    }

    /// Delete a track and its produced file. Row first: a half-deleted track
    /// must not look ready.
    pub async fn delete(&self, id: SubtitleId) -> PipelineResult<()> {
        let subtitle = self.subtitles.delete(id).await?;

        if let Some(srt_path) = &subtitle.srt_path {
            if let Err(e) = self.storage.delete(srt_path).await {
                warn!(subtitle_id = %id, "Failed to delete subtitle object: {}", e);
            }
        }

        // Allow an immediate re-request for the same language.
        for stage in [SubtitleStage::Detect, SubtitleStage::Transcribe, SubtitleStage::Translate] {
            let key = SubtitleJob::new(id, subtitle.video_id, &subtitle.language, stage)
                .idempotency_key();
            let _ = self.queue.purge(JobKind::Subtitle, &key).await;
        }

        Ok(())
    }

    pub async fn list_for_video(&self, video_id: VideoId) -> PipelineResult<Vec<Subtitle>> {
        Ok(self.subtitles.list_by_video(video_id).await?)
    }

    /// The queue stage a row's current status corresponds to.
    pub(crate) fn stage_for_status(status: SubtitleStatus) -> Option<SubtitleStage> {
        match status {
            SubtitleStatus::Detecting => Some(SubtitleStage::Detect),
            SubtitleStatus::Processing => Some(SubtitleStage::Transcribe),
            SubtitleStatus::Translating => Some(SubtitleStage::Translate),
            _ => None,
        }
    }

    async fn clear_stage_window(&self, subtitle: &Subtitle) {
        if let Some(stage) = Self::stage_for_status(subtitle.status) {
            let key = SubtitleJob::new(subtitle.id, subtitle.video_id, &subtitle.language, stage)
                .idempotency_key();
            if let Err(e) = self.queue.clear_dedup(&key).await {
                warn!(subtitle_id = %subtitle.id, "Failed to clear dedup window: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_for_status() {
        assert_eq!(
            SubtitlePipeline::stage_for_status(SubtitleStatus::Detecting),
            Some(SubtitleStage::Detect)
        );
        assert_eq!(
            SubtitlePipeline::stage_for_status(SubtitleStatus::Processing),
            Some(SubtitleStage::Transcribe)
        );
        assert_eq!(
            SubtitlePipeline::stage_for_status(SubtitleStatus::Translating),
            Some(SubtitleStage::Translate)
        );
        assert_eq!(SubtitlePipeline::stage_for_status(SubtitleStatus::Ready), None);
    }
}
