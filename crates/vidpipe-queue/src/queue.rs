//! Durable job bus over Redis Streams.
//!
//! One stream per job kind with a single consumer group. Publishing
//! deduplicates on the job's idempotency key within a bounded window;
//! consumption is a pull subscription whose messages carry a lease that the
//! worker extends (`in_progress`) until `ack` or `nak`. Messages fetched
//! more than `max_deliveries` times spill over to the kind's DLQ stream.

use std::collections::HashMap;
use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{JobKind, QueueJob};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Consumer group name shared by all streams
    pub consumer_group: String,
    /// Delivery attempts before a message is dropped to the DLQ
    pub max_deliveries: u32,
    /// Publish-window dedup TTL
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            consumer_group: "vidpipe:workers".to_string(),
            max_deliveries: 3,
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vidpipe:workers".to_string()),
            max_deliveries: std::env::var("QUEUE_MAX_DELIVERIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            dedup_ttl: Duration::from_secs(
                std::env::var("QUEUE_DEDUP_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        }
    }
}

/// One fetched message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub job: QueueJob,
    /// How many times the bus has handed this message out, this fetch included.
    pub delivery_count: u32,
}

/// Pending/DLQ depth for one job kind.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct KindStats {
    pub pending: u64,
    pub dlq: u64,
}

/// Job bus client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn max_deliveries(&self) -> u32 {
        self.config.max_deliveries
    }

    /// Initialize every stream's consumer group.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for kind in JobKind::ALL {
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(kind.stream())
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!("Created consumer group on {}", kind.stream()),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!("Consumer group already exists on {}", kind.stream());
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }

    fn dedup_key(idempotency_key: &str) -> String {
        format!("jobs:dedup:{}", idempotency_key)
    }

    /// Publish a job, deduplicated on its idempotency key.
    ///
    /// Returns the stream message id. A second publish while the key is live
    /// fails with `QueueError::Duplicate` — the invariant is at most one
    /// unacked message per key.
    pub async fn publish(&self, job: &QueueJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let idempotency_key = job.idempotency_key();
        let dedup_key = Self::dedup_key(&idempotency_key);

        let acquired: bool = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs())
            .query_async(&mut conn)
            .await
            .unwrap_or(false);

        if !acquired {
            warn!("Duplicate publish rejected: {}", idempotency_key);
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let message_id = self.append(&mut conn, job).await?;

        info!(
            key = %idempotency_key,
            message_id = %message_id,
            "Published {} job",
            job.kind()
        );

        Ok(message_id)
    }

    /// Append to the stream without touching the dedup window. Used for
    /// nak-delayed redelivery, where the key is already held.
    async fn append(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &QueueJob,
    ) -> QueueResult<String> {
        let payload = serde_json::to_string(job)?;
        let message_id: String = redis::cmd("XADD")
            .arg(job.kind().stream())
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(job.idempotency_key())
            .query_async(conn)
            .await?;
        Ok(message_id)
    }

    /// Drop the dedup window for a key, allowing the next publish.
    ///
    /// Called when the job reaches a terminal outcome (ack, DLQ, purge).
    pub async fn clear_dedup(&self, idempotency_key: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::dedup_key(idempotency_key)).await?;
        debug!("Cleared dedup window: {}", idempotency_key);
        Ok(())
    }

    /// Pull new messages for `kind` as `consumer`.
    ///
    /// Freshly read messages have `delivery_count = 1`; redelivered ones are
    /// surfaced through `claim_stalled`.
    pub async fn consume(
        &self,
        kind: JobKind,
        consumer: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(kind.stream())
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<QueueJob>(&payload_str) {
                        Ok(job) => deliveries.push(Delivery {
                            message_id,
                            job,
                            delivery_count: 1,
                        }),
                        Err(e) => {
                            warn!("Dropping malformed message {}: {}", message_id, e);
                            self.ack(kind, &message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(deliveries)
    }

    /// Extend the lease on a message that is still being worked.
    ///
    /// Resets the idle clock so `claim_stalled` leaves it alone. Workers call
    /// this periodically between fetch and ack/nak.
    pub async fn in_progress(
        &self,
        kind: JobKind,
        consumer: &str,
        message_id: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // XCLAIM with min-idle 0 re-homes the message to this consumer and
        // resets its idle time; JUSTID skips the payload transfer.
        let _res: redis::Value = redis::cmd("XCLAIM")
            .arg(kind.stream())
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(0)
            .arg(message_id)
            .arg("JUSTID")
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    /// Acknowledge a message as done and remove it from the stream.
    pub async fn ack(&self, kind: JobKind, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(kind.stream())
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(kind.stream())
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acked {}", message_id);
        Ok(())
    }

    /// Negative-acknowledge: requeue the job after `delay`.
    ///
    /// The original message is acked away and the payload parked in the
    /// kind's scheduled set; `redeliver_scheduled` moves it back once due.
    /// The dedup window stays held so no competing publish slips in.
    pub async fn nak(
        &self,
        kind: JobKind,
        message_id: &str,
        job: &QueueJob,
        delay: Duration,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let visible_at = chrono::Utc::now().timestamp() + delay.as_secs() as i64;

        redis::cmd("ZADD")
            .arg(kind.scheduled_key())
            .arg(visible_at)
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(kind, message_id).await?;

        info!(
            key = %job.idempotency_key(),
            delay_secs = delay.as_secs(),
            "Nak'd message, redelivery scheduled"
        );
        Ok(())
    }

    /// Move due nak-delayed jobs back onto their stream.
    ///
    /// Called periodically by the owning service; returns how many moved.
    pub async fn redeliver_scheduled(&self, kind: JobKind) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let now = chrono::Utc::now().timestamp();
        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(kind.scheduled_key())
            .arg(0)
            .arg(now)
            .query_async(&mut conn)
            .await?;

        if due.is_empty() {
            return Ok(0);
        }

        let mut moved = 0;
        for payload in &due {
            match serde_json::from_str::<QueueJob>(payload) {
                Ok(job) => {
                    self.append(&mut conn, &job).await?;
                    moved += 1;
                }
                Err(e) => warn!("Dropping malformed scheduled job: {}", e),
            }

            redis::cmd("ZREM")
                .arg(kind.scheduled_key())
                .arg(payload)
                .query_async::<()>(&mut conn)
                .await
                .ok();
        }

        if moved > 0 {
            info!(count = moved, "Redelivered scheduled {} jobs", kind);
        }
        Ok(moved)
    }

    /// Claim messages whose lease lapsed (crashed or stalled consumer).
    ///
    /// Messages past `max_deliveries` are mirrored to the DLQ stream and
    /// acked instead of being returned — the bus-side drop with spillover.
    pub async fn claim_stalled(
        &self,
        kind: JobKind,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let min_idle_ms = min_idle.as_millis() as u64;

        // [id, consumer, idle_ms, delivery_count] rows
        let pending: Vec<Vec<redis::Value>> = redis::cmd("XPENDING")
            .arg(kind.stream())
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();

        let mut stale: Vec<(String, u32)> = Vec::new();
        for row in pending {
            let id = match row.first() {
                Some(redis::Value::BulkString(b)) => String::from_utf8_lossy(b).to_string(),
                _ => continue,
            };
            let idle_ms = match row.get(2) {
                Some(redis::Value::Int(v)) => *v as u64,
                _ => continue,
            };
            let delivered = match row.get(3) {
                Some(redis::Value::Int(v)) => *v as u32,
                _ => 1,
            };
            if idle_ms >= min_idle_ms {
                stale.push((id, delivered));
            }
        }

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let mut deliveries = Vec::new();

        for (message_id, delivered) in stale {
            let claimed: Vec<Vec<redis::Value>> = redis::cmd("XCLAIM")
                .arg(kind.stream())
                .arg(&self.config.consumer_group)
                .arg(consumer)
                .arg(min_idle_ms)
                .arg(&message_id)
                .query_async(&mut conn)
                .await
                .unwrap_or_default();

            let Some(job) = claimed.first().and_then(|m| parse_claimed_job(m)) else {
                continue;
            };

            // This claim is one more delivery.
            let delivery_count = delivered + 1;

            if delivery_count > self.config.max_deliveries {
                self.spill_to_dlq(&mut conn, kind, &message_id, &job, "max deliveries exceeded")
                    .await?;
                continue;
            }

            info!(
                message_id = %message_id,
                delivery_count,
                "Claimed stalled {} message",
                kind
            );
            deliveries.push(Delivery {
                message_id,
                job,
                delivery_count,
            });
        }

        Ok(deliveries)
    }

    /// Mirror a message onto the DLQ stream and ack the original.
    async fn spill_to_dlq(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        kind: JobKind,
        message_id: &str,
        job: &QueueJob,
        reason: &str,
    ) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(kind.dlq_stream())
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(reason)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;

        self.ack(kind, message_id).await?;
        self.clear_dedup(&job.idempotency_key()).await?;

        warn!(
            key = %job.idempotency_key(),
            "Moved {} message to DLQ: {}",
            kind,
            reason
        );
        Ok(())
    }

    /// Drop every in-flight message whose idempotency key matches.
    ///
    /// Admin/sweeper operation: used once authoritative state has advanced
    /// past `processing` and a lingering message would only confuse a worker.
    /// Returns how many messages were purged.
    pub async fn purge(&self, kind: JobKind, idempotency_key: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let entries: Vec<(String, HashMap<String, redis::Value>)> = redis::cmd("XRANGE")
            .arg(kind.stream())
            .arg("-")
            .arg("+")
            .query_async(&mut conn)
            .await?;

        let mut purged = 0u32;
        for (message_id, fields) in entries {
            let matches = matches!(
                fields.get("key"),
                Some(redis::Value::BulkString(k)) if String::from_utf8_lossy(k) == idempotency_key
            );
            if matches {
                self.ack(kind, &message_id).await?;
                purged += 1;
            }
        }

        // Drop any parked redelivery of the same key as well.
        let scheduled: Vec<String> = redis::cmd("ZRANGE")
            .arg(kind.scheduled_key())
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();
        for payload in scheduled {
            if let Ok(job) = serde_json::from_str::<QueueJob>(&payload) {
                if job.idempotency_key() == idempotency_key {
                    redis::cmd("ZREM")
                        .arg(kind.scheduled_key())
                        .arg(&payload)
                        .query_async::<()>(&mut conn)
                        .await
                        .ok();
                    purged += 1;
                }
            }
        }

        self.clear_dedup(idempotency_key).await?;

        if purged > 0 {
            info!(key = %idempotency_key, purged, "Purged {} messages", kind);
        }
        Ok(purged)
    }

    /// Current depth of one kind's stream and DLQ.
    pub async fn kind_stats(&self, kind: JobKind) -> QueueResult<KindStats> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pending: u64 = conn.xlen(kind.stream()).await?;
        let dlq: u64 = conn.xlen(kind.dlq_stream()).await?;
        Ok(KindStats { pending, dlq })
    }

    /// Depths for every kind, keyed by kind name.
    pub async fn stats(&self) -> QueueResult<HashMap<String, KindStats>> {
        let mut stats = HashMap::new();
        for kind in JobKind::ALL {
            stats.insert(kind.as_str().to_string(), self.kind_stats(kind).await?);
        }
        Ok(stats)
    }
}

/// Pull the `job` field out of one XCLAIM reply entry.
fn parse_claimed_job(message: &[redis::Value]) -> Option<QueueJob> {
    let redis::Value::Array(fields) = message.get(1)? else {
        return None;
    };

    let mut i = 0;
    while i + 1 < fields.len() {
        if let (redis::Value::BulkString(name), redis::Value::BulkString(value)) =
            (&fields[i], &fields[i + 1])
        {
            if name.as_slice() == b"job" {
                return serde_json::from_slice(value).ok();
            }
        }
        i += 2;
    }
    None
}
