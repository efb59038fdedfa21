//! Per-video progress fan-out via Redis Pub/Sub.
//!
//! Workers publish frames while processing; the API's WebSocket layer
//! subscribes per video and forwards to clients. Nothing is persisted and
//! delivery is at-most-once — a late subscriber simply misses earlier frames.

use redis::AsyncCommands;
use tracing::debug;

use vidpipe_models::{ProgressFrame, VideoId};

use crate::error::QueueResult;

/// Channel for publishing/subscribing to progress frames.
#[derive(Clone)]
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Pub/Sub channel name for a video.
    pub fn channel_name(video_id: &VideoId) -> String {
        format!("progress:video:{}", video_id)
    }

    /// Publish one frame.
    pub async fn publish(&self, frame: &ProgressFrame) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&frame.video_id);
        let payload = serde_json::to_string(frame)?;

        debug!("Publishing progress frame to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    /// Subscribe to a video's frames.
    ///
    /// Returns a pinned stream that can be polled with `.next()`; dropping
    /// it unsubscribes.
    pub async fn subscribe(
        &self,
        video_id: &VideoId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = ProgressFrame> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(Self::channel_name(video_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}
