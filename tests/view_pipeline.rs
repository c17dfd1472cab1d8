mod common;

use std::sync::Arc;
use std::time::Duration;

use agora::application::aggregator::{DrainOutcome, ViewAggregator};
use agora::application::jobs::{DrainReason, DrainViewsJobPayload};
use agora::application::repos::{RepoError, ViewEventsRepo};
use agora::application::views::{ViewError, ViewQueueConfig};
use agora::cache::{CacheError, KvStore};
use agora::domain::types::JobType;
use agora::domain::views::ViewEvent;
use async_trait::async_trait;
use time::OffsetDateTime;

use common::Harness;

fn small_queue(threshold: usize, batch_size: usize) -> ViewQueueConfig {
    ViewQueueConfig {
        drain_threshold: threshold,
        batch_size,
        ..Default::default()
    }
}

fn drain_reasons(harness: &Harness) -> Vec<DrainReason> {
    harness
        .repos
        .enqueued_jobs()
        .into_iter()
        .filter(|job| job.job_type == JobType::DrainViews)
        .map(|job| {
            serde_json::from_value::<DrainViewsJobPayload>(job.payload)
                .expect("drain payload")
                .reason
        })
        .collect()
}

#[tokio::test]
async fn first_view_arms_delayed_drain_and_threshold_arms_immediate() {
    let harness = Harness::with_queue(small_queue(3, 10));
    let before = OffsetDateTime::now_utc();

    for expected_len in 1..=9 {
        let len = harness.views.record(42).await.expect("record");
        assert_eq!(len, expected_len);
    }

    // Growing past the threshold arms nothing further.
    assert_eq!(
        drain_reasons(&harness),
        vec![DrainReason::ColdStart, DrainReason::Threshold]
    );

    let jobs = harness.repos.enqueued_jobs();
    let cold_start = &jobs[0];
    assert!(cold_start.run_at >= before + time::Duration::seconds(60));
    assert!(jobs[1].run_at < cold_start.run_at);
}

#[tokio::test]
async fn pushes_between_edges_do_not_trigger() {
    let harness = Harness::new();
    for _ in 0..99 {
        harness.views.record(7).await.expect("record");
    }
    assert_eq!(drain_reasons(&harness), vec![DrainReason::ColdStart]);

    for _ in 0..200 {
        harness.views.record(7).await.expect("record");
    }
    assert_eq!(
        drain_reasons(&harness),
        vec![DrainReason::ColdStart, DrainReason::Threshold]
    );
}

#[tokio::test]
async fn queue_refilled_after_drain_arms_both_edges_again() {
    let harness = Harness::with_queue(small_queue(2, 10));
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "refill").await;

    for _ in 0..2 {
        harness.views.record(thread.id).await.expect("record");
    }
    harness.aggregator.drain_all().await.expect("drain");
    for _ in 0..2 {
        harness.views.record(thread.id).await.expect("record");
    }

    assert_eq!(
        drain_reasons(&harness),
        vec![
            DrainReason::ColdStart,
            DrainReason::Threshold,
            DrainReason::ColdStart,
            DrainReason::Threshold
        ]
    );
}

#[tokio::test]
async fn drain_persists_every_valid_record() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "hello").await;

    for _ in 0..5 {
        harness.views.record(thread.id).await.expect("record");
    }

    let outcome = harness.aggregator.drain_and_persist().await.expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Persisted {
            taken: 5,
            written: 5
        }
    );
    assert_eq!(harness.repos.count_events().await.expect("count"), 5);
    assert_eq!(harness.views.queue_len().await.expect("len"), 0);

    // Nothing left for the delayed cold-start drain.
    assert_eq!(
        harness.aggregator.drain_and_persist().await.expect("drain"),
        DrainOutcome::Empty
    );
}

#[tokio::test]
async fn views_of_missing_threads_are_dropped_at_persistence() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "kept").await;

    harness.views.record(thread.id).await.expect("record");
    harness.views.record(987_654).await.expect("record");

    let outcome = harness.aggregator.drain_and_persist().await.expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Persisted {
            taken: 2,
            written: 1
        }
    );
}

#[tokio::test]
async fn drain_takes_at_most_one_batch_oldest_first() {
    let harness = Harness::with_queue(small_queue(100, 2));
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "busy").await;

    let base = OffsetDateTime::now_utc() - time::Duration::minutes(10);
    for offset in 0..5 {
        let event = ViewEvent::new(thread.id, base + time::Duration::seconds(offset));
        harness.views.record_event(event).await.expect("record");
    }

    let outcome = harness.aggregator.drain_and_persist().await.expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Persisted {
            taken: 2,
            written: 2
        }
    );
    assert_eq!(harness.views.queue_len().await.expect("len"), 3);

    let remaining = harness.aggregator.drain_all().await.expect("drain all");
    assert_eq!(remaining, 3);
    assert_eq!(harness.repos.count_events().await.expect("count"), 5);
}

#[tokio::test]
async fn corrupt_batch_is_dead_lettered_without_partial_writes() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "t").await;

    harness.views.record(thread.id).await.expect("record");
    harness
        .store
        .list_push(&harness.queue_config.queue_key, "not-a-view")
        .await
        .expect("push");

    let err = harness
        .aggregator
        .drain_and_persist()
        .await
        .expect_err("corrupt batch");
    assert!(matches!(err, ViewError::Corrupt { dead_lettered: 2, .. }));

    assert_eq!(harness.repos.count_events().await.expect("count"), 0);
    assert_eq!(harness.views.queue_len().await.expect("len"), 0);
    assert_eq!(
        harness
            .store
            .list_len(&harness.queue_config.dead_letter_key())
            .await
            .expect("dead letter len"),
        2
    );
}

/// Delegates to the harness store but refuses every bulk push, which is how
/// the dead-letter list is written.
struct DeadLetterDown(Arc<dyn KvStore>);

#[async_trait]
impl KvStore for DeadLetterDown {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.0.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<usize, CacheError> {
        self.0.delete(key).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        self.0.set_if_absent(key, value, ttl).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        self.0.delete_if_equals(key, expected).await
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        self.0.list_push(key, value).await
    }

    async fn list_push_many(&self, _key: &str, _values: &[String]) -> Result<usize, CacheError> {
        Err(CacheError::backend("connection refused"))
    }

    async fn list_len(&self, key: &str) -> Result<usize, CacheError> {
        self.0.list_len(key).await
    }

    async fn list_take_oldest(&self, key: &str, count: usize) -> Result<Vec<String>, CacheError> {
        self.0.list_take_oldest(key, count).await
    }

    async fn list_requeue(&self, key: &str, values: &[String]) -> Result<usize, CacheError> {
        self.0.list_requeue(key, values).await
    }
}

#[tokio::test]
async fn corrupt_batch_is_not_requeued_when_dead_letter_fails() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "t").await;
    let aggregator = ViewAggregator::new(
        Arc::new(DeadLetterDown(harness.store.clone())),
        harness.repos.clone(),
        harness.queue_config.clone(),
    );

    harness
        .store
        .list_push(&harness.queue_config.queue_key, "not-a-view")
        .await
        .expect("push");

    let err = aggregator.drain_and_persist().await.expect_err("corrupt batch");
    assert!(matches!(err, ViewError::Corrupt { dead_lettered: 0, .. }));
    assert_eq!(harness.views.queue_len().await.expect("len"), 0);

    // Later views are not stuck behind the rejected batch.
    harness.views.record(thread.id).await.expect("record");
    assert_eq!(
        aggregator.drain_and_persist().await.expect("drain"),
        DrainOutcome::Persisted {
            taken: 1,
            written: 1
        }
    );
    assert_eq!(aggregator.drain_and_persist().await.expect("drain"), DrainOutcome::Empty);
}

struct UnavailableEvents;

#[async_trait]
impl ViewEventsRepo for UnavailableEvents {
    async fn insert_batch(&self, _events: &[ViewEvent]) -> Result<u64, RepoError> {
        Err(RepoError::Timeout)
    }

    async fn count_events(&self) -> Result<u64, RepoError> {
        Ok(0)
    }
}

#[tokio::test]
async fn failed_insert_returns_batch_to_queue_in_order() {
    let harness = Harness::new();
    let failing = ViewAggregator::new(
        harness.store.clone(),
        Arc::new(UnavailableEvents),
        harness.queue_config.clone(),
    );

    for id in 1..=3 {
        harness.views.record(id).await.expect("record");
    }
    let before = harness
        .store
        .list_take_oldest(&harness.queue_config.queue_key, 10)
        .await
        .expect("peek");
    harness
        .store
        .list_requeue(&harness.queue_config.queue_key, &before)
        .await
        .expect("restore");

    let err = failing.drain_and_persist().await.expect_err("insert fails");
    assert!(matches!(err, ViewError::Repo(RepoError::Timeout)));

    let after = harness
        .store
        .list_take_oldest(&harness.queue_config.queue_key, 10)
        .await
        .expect("take");
    assert_eq!(after, before);
}

#[tokio::test]
async fn cold_start_delay_follows_configuration() {
    let harness = Harness::with_queue(ViewQueueConfig {
        cold_start_delay: Duration::from_secs(5),
        ..Default::default()
    });
    let before = OffsetDateTime::now_utc();
    harness.views.record(1).await.expect("record");

    let jobs = harness.repos.enqueued_jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].run_at >= before + time::Duration::seconds(5));
    assert!(jobs[0].run_at < before + time::Duration::seconds(60));
}
