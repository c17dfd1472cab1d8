mod common;

use agora::application::repos::{CreateTagParams, RepoError, TagsWriteRepo};
use agora::application::tags::{CreateTagCommand, TagServiceError};
use agora::cache::{CacheKey, KvStore};

use common::Harness;

async fn is_cached(harness: &Harness, key: CacheKey) -> bool {
    harness
        .store
        .get(&harness.cache.full_key(&key))
        .await
        .expect("get")
        .is_some()
}

fn names(tags: &[agora::domain::entities::TagRecord]) -> Vec<&str> {
    tags.iter().map(|tag| tag.name.as_str()).collect()
}

#[tokio::test]
async fn tag_list_is_served_from_cache_until_a_tag_is_created() {
    let harness = Harness::new();
    harness.seed_tag("rust").await;

    assert_eq!(names(&harness.tags.list_all().await.expect("list")), vec!["rust"]);
    assert!(is_cached(&harness, CacheKey::AllTags).await);

    // A write that bypasses the service is invisible while the entry lives.
    harness
        .repos
        .create_tag(CreateTagParams {
            name: "sneaky".to_string(),
            description: None,
        })
        .await
        .expect("direct insert");
    assert_eq!(names(&harness.tags.list_all().await.expect("list")), vec!["rust"]);

    harness.seed_tag("async").await;
    assert!(!is_cached(&harness, CacheKey::AllTags).await);
    assert_eq!(
        names(&harness.tags.list_all().await.expect("list")),
        vec!["async", "rust", "sneaky"]
    );
}

#[tokio::test]
async fn duplicate_tag_name_is_rejected_and_cache_untouched() {
    let harness = Harness::new();
    harness.seed_tag("rust").await;
    harness.tags.list_all().await.expect("list");

    let err = harness
        .tags
        .create_tag(CreateTagCommand {
            name: "  rust ".to_string(),
            description: None,
        })
        .await
        .expect_err("duplicate");
    assert!(matches!(
        err,
        TagServiceError::Repo(RepoError::Duplicate { .. })
    ));
    assert!(is_cached(&harness, CacheKey::AllTags).await);
}

#[tokio::test]
async fn assigning_a_tag_evicts_that_threads_tags() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "question").await;
    let other = harness.seed_thread(category, "unrelated").await;
    let tag = harness.seed_tag("rust").await;

    assert!(
        harness
            .tags
            .list_for_thread(thread.id)
            .await
            .expect("list")
            .is_empty()
    );
    harness.tags.list_for_thread(other.id).await.expect("list");
    assert!(is_cached(&harness, CacheKey::ThreadTags(thread.id)).await);

    assert!(harness.tags.assign_tag(tag, thread.id).await.expect("assign"));
    assert!(!is_cached(&harness, CacheKey::ThreadTags(thread.id)).await);
    assert!(is_cached(&harness, CacheKey::ThreadTags(other.id)).await);

    let tags = harness.tags.list_for_thread(thread.id).await.expect("list");
    assert_eq!(names(&tags), vec!["rust"]);

    // Second assignment is a no-op.
    assert!(!harness.tags.assign_tag(tag, thread.id).await.expect("assign"));
    assert_eq!(
        harness
            .tags
            .list_for_thread(thread.id)
            .await
            .expect("list")
            .len(),
        1
    );
}

#[tokio::test]
async fn assigning_to_unknown_targets_fails() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "question").await;
    let tag = harness.seed_tag("rust").await;

    assert!(matches!(
        harness.tags.assign_tag(tag + 100, thread.id).await,
        Err(TagServiceError::TagNotFound(_))
    ));
    assert!(matches!(
        harness.tags.assign_tag(tag, thread.id + 100).await,
        Err(TagServiceError::ThreadNotFound(_))
    ));
}

#[tokio::test]
async fn homepage_is_evicted_by_category_and_thread_writes() {
    let harness = Harness::new();
    let child = harness.seed_category().await;

    let sections = harness.forum.homepage().await.expect("homepage");
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].children.len(), 1);
    assert_eq!(sections[0].children[0].thread_count, 0);
    assert!(is_cached(&harness, CacheKey::Homepage).await);

    harness.seed_thread(child, "first post").await;
    assert!(!is_cached(&harness, CacheKey::Homepage).await);
    let sections = harness.forum.homepage().await.expect("homepage");
    assert_eq!(sections[0].children[0].thread_count, 1);

    harness
        .forum
        .create_category("Meta", None)
        .await
        .expect("category");
    assert!(!is_cached(&harness, CacheKey::Homepage).await);
    assert_eq!(harness.forum.homepage().await.expect("homepage").len(), 2);
}

#[tokio::test]
async fn threads_only_live_under_child_categories() {
    let harness = Harness::new();
    let root = harness
        .forum
        .create_category("Root", None)
        .await
        .expect("root");

    assert!(harness.forum.create_thread("nope", root.id, None).await.is_err());
    assert!(
        harness
            .forum
            .create_category("Grandchild", Some(harness.seed_category().await))
            .await
            .is_err()
    );
}
