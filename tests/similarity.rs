mod common;

use std::sync::Arc;

use agora::application::repos::{GraphRepo, RepoError};
use agora::application::similarity::{SimilarityError, SimilarityService};
use agora::domain::entities::{GraphNeighbor, SimilarityEdge};
use async_trait::async_trait;

use common::Harness;

struct Fixture {
    harness: Harness,
    source: i64,
    twin: i64,
    cousin: i64,
    stranger: i64,
}

/// `twin` shares both tags and the category with `source`, `cousin` one tag
/// and the category, `stranger` nothing.
async fn fixture() -> Fixture {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let elsewhere = harness
        .forum
        .create_category("Elsewhere", None)
        .await
        .expect("root");
    let elsewhere = harness
        .forum
        .create_category("Offtopic", Some(elsewhere.id))
        .await
        .expect("child");

    let source = harness.seed_thread(category, "borrowck help").await.id;
    let twin = harness.seed_thread(category, "lifetimes again").await.id;
    let cousin = harness.seed_thread(category, "async traits").await.id;
    let stranger = harness.seed_thread(elsewhere.id, "gardening").await.id;

    let rust = harness.seed_tag("rust").await;
    let lifetimes = harness.seed_tag("lifetimes").await;
    for (tag, thread) in [(rust, source), (lifetimes, source), (rust, twin), (lifetimes, twin)] {
        harness.tags.assign_tag(tag, thread).await.expect("assign");
    }
    harness.tags.assign_tag(rust, cousin).await.expect("assign");

    Fixture {
        harness,
        source,
        twin,
        cousin,
        stranger,
    }
}

#[tokio::test]
async fn ranks_by_shared_neighbours() {
    let fx = fixture().await;
    let similar = fx
        .harness
        .similarity
        .get_similar(fx.source, 5)
        .await
        .expect("similar");

    let ranked: Vec<(i64, i64)> = similar
        .iter()
        .map(|thread| (thread.thread_id, thread.shared_count))
        .collect();
    assert_eq!(ranked, vec![(fx.twin, 3), (fx.cousin, 2)]);
    assert!(similar.iter().all(|thread| thread.thread_id != fx.stranger));
}

#[tokio::test]
async fn never_returns_the_source_thread() {
    let fx = fixture().await;
    for thread in [fx.source, fx.twin, fx.cousin, fx.stranger] {
        let similar = fx
            .harness
            .similarity
            .get_similar(thread, 10)
            .await
            .expect("similar");
        assert!(similar.iter().all(|other| other.thread_id != thread));
    }
}

#[tokio::test]
async fn isolated_thread_has_no_similar_threads() {
    let fx = fixture().await;
    let similar = fx
        .harness
        .similarity
        .get_similar(fx.stranger, 5)
        .await
        .expect("similar");
    assert!(similar.is_empty());
}

#[tokio::test]
async fn limit_cuts_the_ranking() {
    let fx = fixture().await;
    let similar = fx
        .harness
        .similarity
        .get_similar(fx.source, 1)
        .await
        .expect("similar");
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].thread_id, fx.twin);

    assert!(
        fx.harness
            .similarity
            .get_similar(fx.source, 0)
            .await
            .expect("similar")
            .is_empty()
    );
}

#[tokio::test]
async fn unknown_thread_is_not_found() {
    let fx = fixture().await;
    let err = fx
        .harness
        .similarity
        .get_similar(424_242, 5)
        .await
        .expect_err("missing thread");
    assert!(matches!(err, SimilarityError::NotFound(424_242)));
}

struct UnreachableGraph;

#[async_trait]
impl GraphRepo for UnreachableGraph {
    async fn merge_thread(
        &self,
        _thread_id: i64,
        _neighbors: &[GraphNeighbor],
    ) -> Result<(), RepoError> {
        Err(RepoError::Timeout)
    }

    async fn shared_neighbor_counts(
        &self,
        _thread_id: i64,
    ) -> Result<Vec<SimilarityEdge>, RepoError> {
        Err(RepoError::Timeout)
    }
}

#[tokio::test]
async fn graph_outage_degrades_to_empty() {
    let fx = fixture().await;
    let degraded = SimilarityService::new(fx.harness.repos.clone(), Arc::new(UnreachableGraph));

    let similar = degraded
        .get_similar(fx.source, 5)
        .await
        .expect("degrades instead of failing");
    assert!(similar.is_empty());
}
