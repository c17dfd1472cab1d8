//! In-memory wiring shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use agora::application::aggregator::ViewAggregator;
use agora::application::forum::ForumService;
use agora::application::similarity::SimilarityService;
use agora::application::tags::{CreateTagCommand, TagService};
use agora::application::trending::{TrendingConfig, TrendingService};
use agora::application::views::{ViewBuffer, ViewQueueConfig};
use agora::cache::{CacheAside, CacheConfig, KvStore, MemoryStore};
use agora::domain::entities::ThreadRecord;
use agora::infra::http::ApiState;
use agora::infra::memory::{MemoryGraph, MemoryRepositories};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub repos: Arc<MemoryRepositories>,
    pub graph: Arc<MemoryGraph>,
    pub cache: CacheAside,
    pub cache_config: CacheConfig,
    pub queue_config: ViewQueueConfig,
    pub views: Arc<ViewBuffer>,
    pub aggregator: Arc<ViewAggregator>,
    pub trending: Arc<TrendingService>,
    pub similarity: Arc<SimilarityService>,
    pub tags: Arc<TagService>,
    pub forum: Arc<ForumService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_queue(ViewQueueConfig::default())
    }

    pub fn with_queue(queue_config: ViewQueueConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let kv: Arc<dyn KvStore> = store.clone();
        let repos = Arc::new(MemoryRepositories::new());
        let graph = Arc::new(MemoryGraph::new());
        let cache_config = CacheConfig::default();
        let cache = CacheAside::new(kv.clone(), cache_config.key_prefix.clone());

        let views = Arc::new(ViewBuffer::new(
            kv.clone(),
            repos.clone(),
            queue_config.clone(),
        ));
        let aggregator = Arc::new(ViewAggregator::new(
            kv.clone(),
            repos.clone(),
            queue_config.clone(),
        ));
        let trending = Arc::new(TrendingService::new(
            repos.clone(),
            cache.clone(),
            TrendingConfig {
                cache_ttl: cache_config.trending_ttl(),
                lease_ttl: Duration::from_secs(60),
                key_prefix: cache_config.key_prefix.clone(),
            },
        ));
        let similarity = Arc::new(SimilarityService::new(repos.clone(), graph.clone()));
        let tags = Arc::new(TagService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            graph.clone(),
            cache.clone(),
            cache_config.clone(),
        ));
        let forum = Arc::new(ForumService::new(
            repos.clone(),
            graph.clone(),
            cache.clone(),
            cache_config.clone(),
        ));

        Self {
            store,
            repos,
            graph,
            cache,
            cache_config,
            queue_config,
            views,
            aggregator,
            trending,
            similarity,
            tags,
            forum,
        }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            views: self.views.clone(),
            trending: self.trending.clone(),
            similarity: self.similarity.clone(),
            tags: self.tags.clone(),
            forum: self.forum.clone(),
            jobs: self.repos.clone(),
            db: None,
        }
    }

    /// Root and child category; returns the child id.
    pub async fn seed_category(&self) -> i64 {
        let root = self
            .forum
            .create_category("General", None)
            .await
            .expect("root category");
        self.forum
            .create_category("Rust", Some(root.id))
            .await
            .expect("child category")
            .id
    }

    pub async fn seed_thread(&self, category_id: i64, title: &str) -> ThreadRecord {
        self.forum
            .create_thread(title, category_id, None)
            .await
            .expect("thread")
    }

    pub async fn seed_tag(&self, name: &str) -> i64 {
        self.tags
            .create_tag(CreateTagCommand {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("tag")
            .id
    }
}
