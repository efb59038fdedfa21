//! Application state: the composition root's wiring.

use std::sync::Arc;

use vidpipe_pipeline::{
    PipelineConfig, ReelExporter, StuckJobDetector, SubtitlePipeline, UploadOrchestrator,
    VideoPipeline,
};
use vidpipe_queue::{JobQueue, ProgressChannel, QueueConfig, WorkerRegistry};
use vidpipe_storage::ObjectStore;
use vidpipe_store::{
    AdImpressionRepo, DbConfig, ReelRepo, SettingsRepo, SubtitleRepo, UploadSessionRepo,
    VideoRepo, WhitelistRepo,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: ObjectStore,
    pub queue: Arc<JobQueue>,
    pub registry: WorkerRegistry,
    pub progress: ProgressChannel,

    pub videos: VideoRepo,
    pub subtitles: SubtitleRepo,
    pub reels: ReelRepo,
    pub settings: SettingsRepo,
    pub impressions: AdImpressionRepo,
    pub whitelist: WhitelistRepo,

    pub video_pipeline: VideoPipeline,
    pub subtitle_pipeline: SubtitlePipeline,
    pub reel_exporter: ReelExporter,
    pub uploads: UploadOrchestrator,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let pool = vidpipe_store::connect(&DbConfig::from_env()).await?;
        let storage = ObjectStore::from_env()?;

        let queue = Arc::new(JobQueue::new(QueueConfig::from_env())?);
        queue.init().await?;

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let registry = WorkerRegistry::new(&redis_url)?;
        let progress = ProgressChannel::new(&redis_url)?;

        let videos = VideoRepo::new(pool.clone());
        let subtitles = SubtitleRepo::new(pool.clone());
        let reels = ReelRepo::new(pool.clone());
        let settings = SettingsRepo::new(pool.clone());
        let impressions = AdImpressionRepo::new(pool.clone());
        let whitelist = WhitelistRepo::new(pool.clone());
        let sessions = UploadSessionRepo::new(pool);

        let pipeline_config = PipelineConfig::from_env();

        let video_pipeline = VideoPipeline::new(
            videos.clone(),
            settings.clone(),
            Arc::clone(&queue),
            pipeline_config.clone(),
        );
        let subtitle_pipeline = SubtitlePipeline::new(
            subtitles.clone(),
            videos.clone(),
            Arc::clone(&queue),
            storage.clone(),
        );
        let reel_exporter = ReelExporter::new(
            reels.clone(),
            videos.clone(),
            Arc::clone(&queue),
            storage.clone(),
        );
        let uploads = UploadOrchestrator::new(
            sessions,
            settings.clone(),
            storage.clone(),
            video_pipeline.clone(),
            pipeline_config.clone(),
        );

        Ok(Self {
            config,
            storage,
            queue,
            registry,
            progress,
            videos,
            subtitles,
            reels,
            settings,
            impressions,
            whitelist,
            video_pipeline,
            subtitle_pipeline,
            reel_exporter,
            uploads,
        })
    }

    /// Build the stuck-job detector over this state's repositories.
    pub fn stuck_detector(&self) -> StuckJobDetector {
        StuckJobDetector::new(
            self.videos.clone(),
            self.subtitles.clone(),
            self.reels.clone(),
            self.video_pipeline.clone(),
            Arc::clone(&self.queue),
            PipelineConfig::from_env(),
        )
    }
}
