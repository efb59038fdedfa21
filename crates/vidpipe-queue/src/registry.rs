//! Worker presence registry.
//!
//! Workers write their heartbeat to `workers:presence:{worker_id}` with a
//! TTL of three heartbeat intervals; the registry only reads. Expiry is
//! driven entirely by the KV store — absence of a key is the authoritative
//! "offline". The view is eventually consistent and never used for job
//! assignment; that is the queue's job.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::debug;

use vidpipe_models::{WorkerPresence, WorkerSummary};

use crate::error::QueueResult;

/// Heartbeat publish interval workers are expected to keep.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5;

/// Presence TTL: three missed heartbeats mean offline.
pub const PRESENCE_TTL_SECS: u64 = 3 * HEARTBEAT_INTERVAL_SECS;

const PRESENCE_KEY_PREFIX: &str = "workers:presence:";

/// The online worker list plus its aggregate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OnlineWorkers {
    pub workers: Vec<WorkerPresence>,
    pub summary: WorkerSummary,
}

/// Read-side view of worker heartbeats.
#[derive(Clone)]
pub struct WorkerRegistry {
    client: redis::Client,
    ttl: Duration,
}

impl WorkerRegistry {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl: Duration::from_secs(PRESENCE_TTL_SECS),
        })
    }

    fn key(worker_id: &str) -> String {
        format!("{}{}", PRESENCE_KEY_PREFIX, worker_id)
    }

    /// Write one heartbeat. Called by workers, never by the control plane.
    pub async fn record_heartbeat(&self, presence: &WorkerPresence) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(presence)?;

        conn.set_ex::<_, _, ()>(Self::key(&presence.worker_id), payload, self.ttl.as_secs())
            .await?;
        debug!("Recorded heartbeat for {}", presence.worker_id);
        Ok(())
    }

    /// Fetch one worker's latest heartbeat, if it has not expired.
    pub async fn get(&self, worker_id: &str) -> QueueResult<Option<WorkerPresence>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(Self::key(worker_id)).await?;
        Ok(value.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Every non-expired presence entry plus the aggregate summary.
    pub async fn list_online(&self) -> QueueResult<OnlineWorkers> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(format!("{}*", PRESENCE_KEY_PREFIX))
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        let mut workers = Vec::with_capacity(keys.len());
        for key in keys {
            // A key can expire between SCAN and GET; skip silently.
            let value: Option<String> = conn.get(&key).await?;
            if let Some(presence) = value.and_then(|s| serde_json::from_str(&s).ok()) {
                workers.push(presence);
            }
        }

        workers.sort_by(|a: &WorkerPresence, b: &WorkerPresence| a.worker_id.cmp(&b.worker_id));
        let summary = WorkerSummary::from_workers(&workers);

        Ok(OnlineWorkers { workers, summary })
    }
}
