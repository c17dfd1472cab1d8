//! Tag reads (cached) and tag writes with cache eviction.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CreateTagParams, ForumRepo, GraphRepo, RepoError, TagsRepo, TagsWriteRepo,
};
use crate::cache::{CacheAside, CacheConfig, CacheError, CacheKey};
use crate::domain::entities::{GraphNeighbor, TagRecord};
use crate::domain::error::DomainError;
use crate::domain::forum::normalize_tag_name;

#[derive(Debug, Error)]
pub enum TagServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("tag {0} not found")]
    TagNotFound(i64),
    #[error("thread {0} not found")]
    ThreadNotFound(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone)]
pub struct CreateTagCommand {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct TagService {
    reader: Arc<dyn TagsRepo>,
    writer: Arc<dyn TagsWriteRepo>,
    forum: Arc<dyn ForumRepo>,
    graph: Arc<dyn GraphRepo>,
    cache: CacheAside,
    config: CacheConfig,
}

impl TagService {
    pub fn new(
        reader: Arc<dyn TagsRepo>,
        writer: Arc<dyn TagsWriteRepo>,
        forum: Arc<dyn ForumRepo>,
        graph: Arc<dyn GraphRepo>,
        cache: CacheAside,
        config: CacheConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            forum,
            graph,
            cache,
            config,
        }
    }

    pub async fn list_all(&self) -> Result<Vec<TagRecord>, TagServiceError> {
        let reader = self.reader.clone();
        self.cache
            .get_or_compute(&CacheKey::AllTags, self.config.tags_ttl(), || async move {
                reader.list_all().await.map_err(TagServiceError::from)
            })
            .await
    }

    pub async fn list_for_thread(&self, thread_id: i64) -> Result<Vec<TagRecord>, TagServiceError> {
        let reader = self.reader.clone();
        self.cache
            .get_or_compute(
                &CacheKey::ThreadTags(thread_id),
                self.config.thread_tags_ttl(),
                || async move {
                    reader
                        .list_for_thread(thread_id)
                        .await
                        .map_err(TagServiceError::from)
                },
            )
            .await
    }

    pub async fn create_tag(&self, command: CreateTagCommand) -> Result<TagRecord, TagServiceError> {
        let name = normalize_tag_name(&command.name)?;
        let description = command
            .description
            .map(|description| description.trim().to_string())
            .filter(|description| !description.is_empty());

        let tag = self
            .writer
            .create_tag(CreateTagParams { name, description })
            .await?;

        self.cache.invalidate(&CacheKey::AllTags).await?;
        info!(
            target = "application::tags",
            tag_id = tag.id,
            name = %tag.name,
            "tag created"
        );
        Ok(tag)
    }

    /// Attaches a tag to a thread. Idempotent; returns whether a new link was
    /// created.
    ///
    /// The graph edge is merged before the relational row is written. A
    /// failure between the two leaves an extra graph edge, which only ever
    /// makes the thread look slightly more similar to its neighbours.
    pub async fn assign_tag(&self, tag_id: i64, thread_id: i64) -> Result<bool, TagServiceError> {
        let tag = self
            .reader
            .find_by_id(tag_id)
            .await?
            .ok_or(TagServiceError::TagNotFound(tag_id))?;
        if self.forum.find_thread(thread_id).await?.is_none() {
            return Err(TagServiceError::ThreadNotFound(thread_id));
        }

        self.graph
            .merge_thread(thread_id, &[GraphNeighbor::tag(tag.name.clone())])
            .await?;
        let inserted = self.writer.assign_tag(thread_id, tag_id).await?;

        self.cache
            .invalidate(&CacheKey::ThreadTags(thread_id))
            .await?;
        info!(
            target = "application::tags",
            tag_id,
            thread_id,
            inserted,
            "tag assigned"
        );
        Ok(inserted)
    }
}
