//! Direct-upload orchestrator.
//!
//! Clients upload parts straight to the object store through presigned URLs;
//! the orchestrator only tracks session lifecycle. No Video row exists until
//! Complete, and object-store calls never run inside a DB transaction.

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use vidpipe_models::{part_count, CompletedPart, UploadSession, Video, VideoId};
use vidpipe_storage::{object_key, ObjectKind, ObjectStore, UploadedPart};
use vidpipe_store::{NewVideo, SettingsRepo, UploadSessionRepo};

use crate::codes::new_code;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::video::VideoPipeline;

/// How many times to re-roll a colliding code before giving up.
const CODE_ALLOCATION_ATTEMPTS: usize = 5;

/// One presigned part URL handed back to the client.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

/// Result of initializing a direct upload.
#[derive(Debug, Clone)]
pub struct InitializedUpload {
    pub session: UploadSession,
    pub part_urls: Vec<PartUrl>,
}

/// Result of completing a direct upload.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub video: Video,
    pub auto_enqueued: bool,
}

/// Coordinator for multipart upload sessions.
#[derive(Clone)]
pub struct UploadOrchestrator {
    sessions: UploadSessionRepo,
    settings: SettingsRepo,
    storage: ObjectStore,
    video_pipeline: VideoPipeline,
    config: PipelineConfig,
}

impl UploadOrchestrator {
    pub fn new(
        sessions: UploadSessionRepo,
        settings: SettingsRepo,
        storage: ObjectStore,
        video_pipeline: VideoPipeline,
        config: PipelineConfig,
    ) -> Self {
        Self {
            sessions,
            settings,
            storage,
            video_pipeline,
            config,
        }
    }

    /// Start a multipart session: allocate a code, open the upload on the
    /// object store, presign one URL per part, persist the session.
    pub async fn init(
        &self,
        user_id: Uuid,
        filename: &str,
        size: u64,
        content_type: &str,
        title: Option<&str>,
    ) -> PipelineResult<InitializedUpload> {
        if !self.storage.supports_multipart() {
            return Err(PipelineError::NotSupported(
                "direct upload requires a multipart-capable object store".into(),
            ));
        }
        if size == 0 {
            return Err(PipelineError::invalid("upload size must be positive"));
        }
        if filename.is_empty() {
            return Err(PipelineError::invalid("filename must not be empty"));
        }

        let part_size = self
            .settings
            .get_i64_or(
                vidpipe_models::settings::keys::UPLOAD,
                vidpipe_models::settings::keys::PART_SIZE,
                self.config.part_size as i64,
            )
            .await?
            .max(1) as u64;
        let total_parts = part_count(size, part_size);

        // Allocate a code, retrying on the unique index.
        let mut last_err = None;
        for _ in 0..CODE_ALLOCATION_ATTEMPTS {
            let code = new_code();
            let object_path = object_key(ObjectKind::Uploads, &code, filename);

            let upload_id = self
                .storage
                .create_multipart_upload(&object_path, content_type)
                .await?;

            let session = UploadSession {
                id: Uuid::new_v4(),
                upload_id: upload_id.clone(),
                video_code: code.clone(),
                user_id,
                object_path: object_path.clone(),
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                title: title.map(str::to_string),
                total_size: size,
                part_size,
                total_parts,
                expires_at: Utc::now()
                    + chrono::Duration::seconds(self.config.session_ttl.as_secs() as i64),
                created_at: Utc::now(),
            };

            match self.sessions.create(&session).await {
                Ok(session) => {
                    let mut part_urls = Vec::with_capacity(total_parts as usize);
                    for part_number in 1..=total_parts {
                        let url = self
                            .storage
                            .presign_part_url(
                                &object_path,
                                &upload_id,
                                part_number,
                                self.config.presign_ttl,
                            )
                            .await?;
                        part_urls.push(PartUrl { part_number, url });
                    }

                    info!(
                        upload_id = %session.upload_id,
                        code = %session.video_code,
                        total_parts,
                        "Direct upload initialized"
                    );
                    return Ok(InitializedUpload { session, part_urls });
                }
                Err(e) if matches!(e, vidpipe_store::StoreError::Conflict(_)) => {
                    // Code collision: abandon this upload handle and re-roll.
                    let _ = self
                        .storage
                        .abort_multipart_upload(&object_path, &upload_id)
                        .await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(Into::into)
            .unwrap_or_else(|| PipelineError::conflict("could not allocate a unique code")))
    }

    /// Finish a session: assemble the object, then (in one transaction)
    /// create the pending Video and delete the session, then enqueue the
    /// transcode.
    pub async fn complete(
        &self,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> PipelineResult<CompletedUpload> {
        let session = self.sessions.get_by_upload_id(upload_id).await?;
        if session.is_expired(Utc::now()) {
            return Err(PipelineError::SessionExpired);
        }
        if parts.is_empty() {
            return Err(PipelineError::invalid("no parts supplied"));
        }

        let uploaded: Vec<UploadedPart> = parts
            .iter()
            .map(|p| UploadedPart {
                part_number: p.part_number,
                etag: p.etag.clone(),
            })
            .collect();

        // Outside any DB transaction. On failure the session survives so an
        // operator can inspect and abort.
        if let Err(e) = self
            .storage
            .complete_multipart_upload(&session.object_path, upload_id, &uploaded)
            .await
        {
            return Err(PipelineError::UploadAssemblyFailed(e.to_string()));
        }

        let video = self
            .sessions
            .promote_to_video(
                upload_id,
                NewVideo {
                    id: VideoId::new(),
                    code: session.video_code.clone(),
                    user_id: session.user_id,
                    category_id: None,
                    title: session
                        .title
                        .clone()
                        .unwrap_or_else(|| session.filename.clone()),
                    description: None,
                    original_path: Some(session.object_path.clone()),
                },
            )
            .await?;

        let video = self.video_pipeline.enqueue(video.id).await?;
        info!(video_id = %video.id, code = %video.code, "Direct upload completed");

        Ok(CompletedUpload {
            video,
            auto_enqueued: true,
        })
    }

    /// Abort a session: best-effort object-store abort, then delete the row.
    pub async fn abort(&self, upload_id: &str) -> PipelineResult<()> {
        let session = self.sessions.get_by_upload_id(upload_id).await?;

        if let Err(e) = self
            .storage
            .abort_multipart_upload(&session.object_path, upload_id)
            .await
        {
            warn!(upload_id, "Multipart abort failed: {}", e);
        }

        self.sessions.delete(upload_id).await?;
        info!(upload_id, "Upload session aborted");
        Ok(())
    }

    /// Reap expired sessions once. Each one gets the same treatment as an
    /// explicit abort.
    pub async fn reap_expired(&self) -> PipelineResult<u32> {
        let expired = self.sessions.list_expired(Utc::now()).await?;
        let mut reaped = 0u32;

        for session in expired {
            if let Err(e) = self
                .storage
                .abort_multipart_upload(&session.object_path, &session.upload_id)
                .await
            {
                warn!(upload_id = %session.upload_id, "Multipart abort failed: {}", e);
            }
            match self.sessions.delete(&session.upload_id).await {
                Ok(()) => reaped += 1,
                Err(e) => error!(upload_id = %session.upload_id, "Failed to delete session: {}", e),
            }
        }

        if reaped > 0 {
            info!(reaped, "Reaped expired upload sessions");
        }
        Ok(reaped)
    }

    /// Run the session reaper until shutdown.
    pub async fn run_reaper(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            "Starting upload-session reaper (period: {:?})",
            self.config.reaper_period
        );
        let mut ticker = interval(self.config.reaper_period);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Upload-session reaper stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reap_expired().await {
                        error!("Session reap error: {}", e);
                    }
                }
            }
        }
    }
}
