//! Queue/bus integration tests.

use std::time::Duration;

use vidpipe_models::{VideoId, WorkerPresence, WorkerStats, WorkerStatus, WorkerType};
use vidpipe_queue::{
    JobKind, JobQueue, ProgressChannel, QueueJob, TranscodeJob, WorkerRegistry,
};

/// Test bus connection and stream initialization.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_queue_init() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let stats = queue.stats().await.expect("Failed to read stats");
    assert!(stats.contains_key("transcode"));
    assert!(stats.contains_key("reel"));
}

/// Publish → consume → ack cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_consume_ack() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let video_id = VideoId::new();
    let job = QueueJob::Transcode(TranscodeJob::new(video_id, "itest123x"));
    let key = job.idempotency_key();

    queue.publish(&job).await.expect("Failed to publish");

    let deliveries = queue
        .consume(JobKind::Transcode, "itest-consumer", 1000, 10)
        .await
        .expect("Failed to consume");

    let delivery = deliveries
        .iter()
        .find(|d| d.job.idempotency_key() == key)
        .expect("published job not delivered");
    assert_eq!(delivery.delivery_count, 1);

    queue
        .ack(JobKind::Transcode, &delivery.message_id)
        .await
        .expect("Failed to ack");
    queue.clear_dedup(&key).await.expect("Failed to clear dedup");
}

/// A second publish with the same idempotency key is rejected while the
/// first is unacked.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_duplicate_publish_rejected() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let video_id = VideoId::new();
    let job = QueueJob::Transcode(TranscodeJob::new(video_id, "itest456y"));

    queue.publish(&job).await.expect("first publish");
    let err = queue.publish(&job).await.expect_err("duplicate accepted");
    assert!(err.is_duplicate());

    // Cleanup
    queue
        .purge(JobKind::Transcode, &job.idempotency_key())
        .await
        .expect("purge");
}

/// Purge removes the in-flight message and releases the dedup window.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_purge_releases_window() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let video_id = VideoId::new();
    let job = QueueJob::Transcode(TranscodeJob::new(video_id, "itest789z"));
    let key = job.idempotency_key();

    queue.publish(&job).await.expect("publish");
    let purged = queue
        .purge(JobKind::Transcode, &key)
        .await
        .expect("purge");
    assert!(purged >= 1);

    // The window is free again.
    queue.publish(&job).await.expect("re-publish after purge");
    queue.purge(JobKind::Transcode, &key).await.expect("cleanup");
}

/// A message whose lease lapsed is claimable by another consumer; extending
/// the lease with in_progress keeps it away from the claimer.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_lease_and_claim_stalled() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let video_id = VideoId::new();
    let job = QueueJob::Transcode(TranscodeJob::new(video_id, "itestclaim"));
    queue.publish(&job).await.expect("publish");

    let deliveries = queue
        .consume(JobKind::Transcode, "consumer-a", 1000, 10)
        .await
        .expect("consume");
    let delivery = deliveries
        .iter()
        .find(|d| d.job.idempotency_key() == job.idempotency_key())
        .expect("delivered");

    // A fresh lease keeps the message off the stalled list.
    queue
        .in_progress(JobKind::Transcode, "consumer-a", &delivery.message_id)
        .await
        .expect("in_progress");
    let claimed = queue
        .claim_stalled(JobKind::Transcode, "consumer-b", Duration::from_millis(500), 10)
        .await
        .expect("claim_stalled");
    assert!(claimed
        .iter()
        .all(|d| d.message_id != delivery.message_id));

    // After the lease lapses, consumer-b takes over with a bumped count.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let claimed = queue
        .claim_stalled(JobKind::Transcode, "consumer-b", Duration::from_millis(500), 10)
        .await
        .expect("claim_stalled");
    let taken = claimed
        .iter()
        .find(|d| d.message_id == delivery.message_id)
        .expect("stalled message claimed");
    assert!(taken.delivery_count >= 2);

    queue
        .purge(JobKind::Transcode, &job.idempotency_key())
        .await
        .expect("cleanup");
}

/// Heartbeats appear in the registry until their TTL lapses.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_registry_heartbeat_roundtrip() {
    dotenvy::dotenv().ok();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let registry = WorkerRegistry::new(&redis_url).expect("registry");

    let presence = WorkerPresence {
        worker_id: "itest-worker-1".into(),
        worker_type: WorkerType::Transcode,
        hostname: "itest-host".into(),
        status: WorkerStatus::Idle,
        current_jobs: vec![],
        stats: WorkerStats::default(),
        config: serde_json::Value::Null,
        disk: Default::default(),
        last_seen: chrono::Utc::now(),
    };
    registry.record_heartbeat(&presence).await.expect("heartbeat");

    let fetched = registry
        .get("itest-worker-1")
        .await
        .expect("get")
        .expect("present");
    assert_eq!(fetched.hostname, "itest-host");

    let online = registry.list_online().await.expect("list");
    assert!(online.workers.iter().any(|w| w.worker_id == "itest-worker-1"));
    assert!(online.summary.by_type.get("transcode").copied().unwrap_or(0) >= 1);
}

/// Progress frames reach a live subscriber; there is no replay.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_fanout() {
    use futures_util::StreamExt;

    dotenvy::dotenv().ok();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let channel = ProgressChannel::new(&redis_url).expect("channel");

    let video_id = VideoId::new();
    let mut stream = channel.subscribe(&video_id).await.expect("subscribe");

    // Give the subscription a moment to register before publishing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    channel
        .publish(&vidpipe_models::ProgressFrame::new(video_id, "transcode", 42))
        .await
        .expect("publish");

    let frame = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("frame within deadline")
        .expect("stream open");
    assert_eq!(frame.percent, 42);
    assert_eq!(frame.stage, "transcode");
}

/// Nak parks the message; redelivery happens after the delay.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_nak_schedules_redelivery() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let video_id = VideoId::new();
    let job = QueueJob::Transcode(TranscodeJob::new(video_id, "itestnakx"));

    queue.publish(&job).await.expect("publish");
    let deliveries = queue
        .consume(JobKind::Transcode, "itest-consumer", 1000, 10)
        .await
        .expect("consume");
    let delivery = deliveries
        .iter()
        .find(|d| d.job.idempotency_key() == job.idempotency_key())
        .expect("delivered");

    queue
        .nak(JobKind::Transcode, &delivery.message_id, &delivery.job, Duration::from_secs(0))
        .await
        .expect("nak");

    let moved = queue
        .redeliver_scheduled(JobKind::Transcode)
        .await
        .expect("redeliver");
    assert!(moved >= 1);

    queue
        .purge(JobKind::Transcode, &job.idempotency_key())
        .await
        .expect("cleanup");
}
