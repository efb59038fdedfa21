//! Entity-store integration tests: the invariants the pipeline leans on.

use uuid::Uuid;

use vidpipe_models::{TranscodeOutputs, VideoId, VideoStatus};
use vidpipe_store::{ClaimOutcome, DbConfig, NewVideo, VideoRepo};

async fn repo() -> VideoRepo {
    dotenvy::dotenv().ok();
    let pool = vidpipe_store::connect(&DbConfig::from_env())
        .await
        .expect("Failed to connect");
    VideoRepo::new(pool)
}

fn new_video(code: &str) -> NewVideo {
    NewVideo {
        id: VideoId::new(),
        code: code.to_string(),
        user_id: Uuid::new_v4(),
        category_id: None,
        title: "integration".to_string(),
        description: None,
        original_path: None,
    }
}

/// Claim is the only queued → processing path and is single-winner.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_claim_single_winner() {
    let repo = repo().await;
    let video = repo
        .create(new_video(&format!("it{}", &Uuid::new_v4().simple().to_string()[..8])))
        .await
        .expect("create");

    repo.mark_queued(video.id).await.expect("queue");

    let (claimed, outcome) = repo.claim(video.id, "worker-a").await.expect("claim");
    assert_eq!(outcome, ClaimOutcome::Claimed);
    assert_eq!(claimed.status, VideoStatus::Processing);
    assert!(claimed.processing_started_at.is_some());

    // Same worker again: idempotent no-op.
    let (_, outcome) = repo.claim(video.id, "worker-a").await.expect("re-claim");
    assert_eq!(outcome, ClaimOutcome::AlreadyOwned);

    // Different worker: conflict.
    let err = repo.claim(video.id, "worker-b").await.unwrap_err();
    assert!(matches!(err, vidpipe_store::StoreError::Conflict(_)));

    repo.delete(video.id).await.expect("cleanup");
}

/// `processing_started_at` is non-null iff status is processing, across the
/// whole claim → complete walk.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_timestamp_invariant() {
    let repo = repo().await;
    let video = repo
        .create(new_video(&format!("it{}", &Uuid::new_v4().simple().to_string()[..8])))
        .await
        .expect("create");
    assert!(video.processing_started_at.is_none());

    repo.mark_queued(video.id).await.expect("queue");
    repo.claim(video.id, "worker-a").await.expect("claim");

    let outputs = TranscodeOutputs {
        hls_path: "hls/x/master.m3u8".into(),
        hls_path_h264: None,
        audio_path: None,
        thumbnail_url: None,
        duration: Some(12.0),
        detected_language: None,
        disk_usage: 1024,
        quality_sizes: Default::default(),
    };
    let done = repo.complete(video.id, &outputs).await.expect("complete");
    assert_eq!(done.status, VideoStatus::Ready);
    assert!(done.processing_started_at.is_none());
    assert_eq!(done.hls_path.as_deref(), Some("hls/x/master.m3u8"));

    // Re-completion by redelivery is a no-op.
    let again = repo.complete(video.id, &outputs).await.expect("idempotent");
    assert_eq!(again.updated_at, done.updated_at);

    repo.delete(video.id).await.expect("cleanup");
}

/// The beat leaves non-processing rows unchanged.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_beat_only_touches_processing() {
    let repo = repo().await;
    let video = repo
        .create(new_video(&format!("it{}", &Uuid::new_v4().simple().to_string()[..8])))
        .await
        .expect("create");

    assert!(!repo.update_processing_timestamp(video.id).await.expect("beat"));
    let row = repo.get(video.id).await.expect("get");
    assert_eq!(row.status, VideoStatus::Pending);
    assert!(row.processing_started_at.is_none());

    repo.delete(video.id).await.expect("cleanup");
}

/// mark_failed counts attempts and dead-letters past the budget; admin
/// retries between failures preserve the counter, so the error history
/// grows by one per failure.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_retry_budget_and_history() {
    let repo = repo().await;
    let video = repo
        .create(new_video(&format!("it{}", &Uuid::new_v4().simple().to_string()[..8])))
        .await
        .expect("create");

    let max_retries = 3;
    for attempt in 1..=max_retries {
        repo.mark_queued(video.id).await.expect("queue");
        repo.claim(video.id, "worker-a").await.expect("claim");
        let failed = repo
            .mark_failed(video.id, "stuck: no progress for 60s", None, "transcode", max_retries)
            .await
            .expect("fail");

        assert_eq!(failed.retry_count, attempt);
        assert_eq!(failed.error_history.len(), attempt as usize);
        assert!(failed.processing_started_at.is_none());

        if attempt < max_retries {
            assert_eq!(failed.status, VideoStatus::Failed);
            repo.requeue_for_retry(video.id).await.expect("requeue");
        } else {
            assert_eq!(failed.status, VideoStatus::DeadLetter);
        }
    }

    // History survives the explicit reset; the counter does not.
    let reset = repo.reset_for_retry(video.id).await.expect("reset");
    assert_eq!(reset.retry_count, 0);
    assert_eq!(reset.error_history.len(), max_retries as usize);
    assert_eq!(reset.status, VideoStatus::Pending);

    repo.delete(video.id).await.expect("cleanup");
}
