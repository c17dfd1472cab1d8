//! Repository behaviour against a live database. Run with `DATABASE_URL` set
//! and `--ignored`.

use agora::application::repos::{
    CreateCategoryParams, CreateTagParams, CreateThreadParams, ForumRepo, GraphRepo, RepoError,
    TagsRepo, TagsWriteRepo, TrendingRepo, ViewEventsRepo,
};
use agora::domain::entities::{GraphNeighbor, ThreadRecord};
use agora::domain::views::ViewEvent;
use agora::infra::db::{PostgresGraph, PostgresRepositories};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

async fn seed_thread(repos: &PostgresRepositories, title: &str) -> ThreadRecord {
    let root = repos
        .create_category(CreateCategoryParams {
            title: "Root".to_string(),
            parent_id: None,
            level: 0,
        })
        .await
        .expect("root");
    let child = repos
        .create_category(CreateCategoryParams {
            title: "Child".to_string(),
            parent_id: Some(root.id),
            level: 1,
        })
        .await
        .expect("child");
    repos
        .create_thread(CreateThreadParams {
            title: title.to_string(),
            category_id: child.id,
            user_id: None,
        })
        .await
        .expect("thread")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn view_batches_skip_missing_threads(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let thread = seed_thread(&repos, "counted").await;

    let now = OffsetDateTime::now_utc();
    let written = repos
        .insert_batch(&[
            ViewEvent::new(thread.id, now),
            ViewEvent::new(thread.id + 1_000, now),
            ViewEvent::new(thread.id, now - Duration::days(2)),
        ])
        .await
        .expect("insert");

    assert_eq!(written, 2);
    assert_eq!(repos.count_events().await.expect("count"), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn trending_view_scores_windows(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let hot = seed_thread(&repos, "hot").await;
    let warm = seed_thread(&repos, "warm").await;
    let now = OffsetDateTime::now_utc();

    repos
        .insert_batch(&[
            ViewEvent::new(hot.id, now - Duration::hours(1)),
            ViewEvent::new(warm.id, now - Duration::days(3)),
            ViewEvent::new(warm.id, now - Duration::days(40)),
        ])
        .await
        .expect("insert");

    let before = repos.load_snapshot(10).await.expect("load");
    assert!(before.entries.is_empty());

    repos.refresh_snapshot().await.expect("refresh");
    let snapshot = repos.load_snapshot(10).await.expect("load");

    let ranked: Vec<(i64, i64)> = snapshot
        .entries
        .iter()
        .map(|entry| (entry.thread_id, entry.score))
        .collect();
    assert_eq!(ranked, vec![(hot.id, 8), (warm.id, 3)]);
    assert!(snapshot.refreshed_at.is_some());

    assert_eq!(repos.load_snapshot(1).await.expect("load").entries.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn trending_view_stores_only_top_ten(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let now = OffsetDateTime::now_utc();

    let mut events = Vec::new();
    let mut threads = Vec::new();
    for index in 0..12 {
        let thread = seed_thread(&repos, &format!("thread {index}")).await;
        events.push(ViewEvent::new(thread.id, now - Duration::hours(1)));
        threads.push(thread.id);
    }
    let busiest = threads[11];
    events.push(ViewEvent::new(busiest, now - Duration::hours(2)));
    repos.insert_batch(&events).await.expect("insert");

    repos.refresh_snapshot().await.expect("refresh");

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trending_threads")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(stored, 10);

    let snapshot = repos.load_snapshot(50).await.expect("load");
    let ids: Vec<i64> = snapshot.entries.iter().map(|entry| entry.thread_id).collect();
    let mut expected = vec![busiest];
    expected.extend(threads[..9].iter().copied());
    assert_eq!(ids, expected);
    assert_eq!(snapshot.entries[0].score, 16);
    assert!(snapshot.entries[1..].iter().all(|entry| entry.score == 8));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn tag_names_are_unique_and_links_idempotent(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let thread = seed_thread(&repos, "tagged").await;

    let tag = repos
        .create_tag(CreateTagParams {
            name: "rust".to_string(),
            description: None,
        })
        .await
        .expect("tag");
    let err = repos
        .create_tag(CreateTagParams {
            name: "rust".to_string(),
            description: None,
        })
        .await
        .expect_err("duplicate");
    assert!(matches!(err, RepoError::Duplicate { .. }));

    assert!(repos.assign_tag(thread.id, tag.id).await.expect("assign"));
    assert!(!repos.assign_tag(thread.id, tag.id).await.expect("assign again"));

    let tags = repos.list_for_thread(thread.id).await.expect("list");
    assert_eq!(tags, vec![tag]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn tagging_missing_thread_names_the_missing_row(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let thread = seed_thread(&repos, "tagged").await;
    let tag = repos
        .create_tag(CreateTagParams {
            name: "rust".to_string(),
            description: None,
        })
        .await
        .expect("tag");

    let err = repos
        .assign_tag(thread.id + 1000, tag.id)
        .await
        .expect_err("missing thread");
    assert!(
        matches!(&err, RepoError::InvalidInput { message } if message == "thread does not exist"),
        "{err:?}"
    );

    let err = repos
        .assign_tag(thread.id, tag.id + 1000)
        .await
        .expect_err("missing tag");
    assert!(
        matches!(&err, RepoError::InvalidInput { message } if message == "tag does not exist"),
        "{err:?}"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn homepage_counts_threads_per_child(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let thread = seed_thread(&repos, "only").await;

    let sections = repos.load_homepage().await.expect("homepage");
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].children.len(), 1);
    assert_eq!(sections[0].children[0].id, thread.category_id);
    assert_eq!(sections[0].children[0].thread_count, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn graph_counts_shared_neighbours(pool: PgPool) {
    PostgresGraph::run_migrations(&pool)
        .await
        .expect("graph migrations");
    let graph = PostgresGraph::new(pool);

    let rust = GraphNeighbor::tag("rust");
    let web = GraphNeighbor::tag("web");
    let category = GraphNeighbor::category(9);

    graph
        .merge_thread(1, &[rust.clone(), web.clone(), category.clone()])
        .await
        .expect("merge");
    graph
        .merge_thread(2, &[rust.clone(), web.clone()])
        .await
        .expect("merge");
    graph.merge_thread(3, &[category]).await.expect("merge");
    // Merging again changes nothing.
    graph.merge_thread(2, &[rust]).await.expect("merge");
    graph.merge_thread(4, &[]).await.expect("merge");

    let shared: Vec<(i64, i64)> = graph
        .shared_neighbor_counts(1)
        .await
        .expect("shared")
        .into_iter()
        .map(|edge| (edge.thread_id, edge.shared_count))
        .collect();
    assert_eq!(shared, vec![(2, 2), (3, 1)]);
}
