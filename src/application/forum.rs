//! Forum hierarchy: the cached homepage and the writes that invalidate it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CreateCategoryParams, CreateThreadParams, ForumRepo, GraphRepo, RepoError,
};
use crate::cache::{CacheAside, CacheConfig, CacheError, CacheKey};
use crate::domain::entities::{CategoryRecord, GraphNeighbor, HomepageSection, ThreadRecord};
use crate::domain::error::DomainError;
use crate::domain::forum::{child_level, ensure_accepts_threads, normalize_title};

#[derive(Debug, Error)]
pub enum ForumError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("category {0} not found")]
    CategoryNotFound(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Clone)]
pub struct ForumService {
    forum: Arc<dyn ForumRepo>,
    graph: Arc<dyn GraphRepo>,
    cache: CacheAside,
    config: CacheConfig,
}

impl ForumService {
    pub fn new(
        forum: Arc<dyn ForumRepo>,
        graph: Arc<dyn GraphRepo>,
        cache: CacheAside,
        config: CacheConfig,
    ) -> Self {
        Self {
            forum,
            graph,
            cache,
            config,
        }
    }

    pub async fn homepage(&self) -> Result<Vec<HomepageSection>, ForumError> {
        let forum = self.forum.clone();
        self.cache
            .get_or_compute(&CacheKey::Homepage, self.config.homepage_ttl(), || async move {
                forum.load_homepage().await.map_err(ForumError::from)
            })
            .await
    }

    pub async fn find_thread(&self, id: i64) -> Result<Option<ThreadRecord>, ForumError> {
        Ok(self.forum.find_thread(id).await?)
    }

    /// Creates a root category, or a child when `parent_id` names a root.
    pub async fn create_category(
        &self,
        title: &str,
        parent_id: Option<i64>,
    ) -> Result<CategoryRecord, ForumError> {
        let title = normalize_title(title)?;

        let parent = match parent_id {
            Some(parent_id) => Some(
                self.forum
                    .find_category(parent_id)
                    .await?
                    .ok_or(ForumError::CategoryNotFound(parent_id))?,
            ),
            None => None,
        };
        let level = child_level(parent.as_ref())?;

        let category = self
            .forum
            .create_category(CreateCategoryParams {
                title,
                parent_id,
                level,
            })
            .await?;

        self.cache.invalidate(&CacheKey::Homepage).await?;
        info!(
            target = "application::forum",
            category_id = category.id,
            level = category.level,
            "category created"
        );
        Ok(category)
    }

    /// Creates a thread under a child category and links it to that category
    /// in the graph store.
    pub async fn create_thread(
        &self,
        title: &str,
        category_id: i64,
        user_id: Option<i64>,
    ) -> Result<ThreadRecord, ForumError> {
        let title = normalize_title(title)?;

        let category = self
            .forum
            .find_category(category_id)
            .await?
            .ok_or(ForumError::CategoryNotFound(category_id))?;
        ensure_accepts_threads(&category)?;

        let thread = self
            .forum
            .create_thread(CreateThreadParams {
                title,
                category_id,
                user_id,
            })
            .await?;

        if let Err(err) = self
            .graph
            .merge_thread(thread.id, &[GraphNeighbor::category(category_id)])
            .await
        {
            warn!(
                target = "application::forum",
                thread_id = thread.id,
                error = %err,
                "graph merge failed; thread has no category edge"
            );
        }

        self.cache.invalidate(&CacheKey::Homepage).await?;
        info!(
            target = "application::forum",
            thread_id = thread.id,
            category_id,
            "thread created"
        );
        Ok(thread)
    }
}
