//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{
    CategoryRecord, GraphNeighbor, HomepageSection, SimilarityEdge, TagRecord, ThreadRecord,
};
use crate::domain::trending::TrendingSnapshot;
use crate::domain::types::JobType;
use crate::domain::views::ViewEvent;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub title: String,
    /// `None` creates a root category.
    pub parent_id: Option<i64>,
    pub level: i16,
}

#[derive(Debug, Clone)]
pub struct CreateThreadParams {
    pub title: String,
    pub category_id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub name: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait ForumRepo: Send + Sync {
    async fn find_thread(&self, id: i64) -> Result<Option<ThreadRecord>, RepoError>;

    /// Threads among `ids`; unknown ids are skipped. Order is unspecified.
    async fn list_threads_by_ids(&self, ids: &[i64]) -> Result<Vec<ThreadRecord>, RepoError>;

    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError>;

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn create_thread(&self, params: CreateThreadParams) -> Result<ThreadRecord, RepoError>;

    /// Root categories ordered by id, each with its children ordered by id.
    async fn load_homepage(&self) -> Result<Vec<HomepageSection>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Every tag ordered by name.
    async fn list_all(&self) -> Result<Vec<TagRecord>, RepoError>;
    /// Tags of one thread ordered by name.
    async fn list_for_thread(&self, thread_id: i64) -> Result<Vec<TagRecord>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<TagRecord>, RepoError>;
}

#[async_trait]
pub trait TagsWriteRepo: Send + Sync {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError>;

    /// Links a tag to a thread. Returns false when the pair already existed.
    async fn assign_tag(&self, thread_id: i64, tag_id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait ViewEventsRepo: Send + Sync {
    /// Appends events in one transaction. Events for threads that no longer
    /// exist are dropped; the return value counts rows actually written.
    async fn insert_batch(&self, events: &[ViewEvent]) -> Result<u64, RepoError>;

    async fn count_events(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait TrendingRepo: Send + Sync {
    /// Rebuilds the ranked snapshot from the durable event history and swaps
    /// it in atomically.
    async fn refresh_snapshot(&self) -> Result<(), RepoError>;

    async fn load_snapshot(&self, limit: usize) -> Result<TrendingSnapshot, RepoError>;
}

#[async_trait]
pub trait GraphRepo: Send + Sync {
    /// Idempotently upserts the thread node and an edge to every neighbour.
    async fn merge_thread(
        &self,
        thread_id: i64,
        neighbors: &[GraphNeighbor],
    ) -> Result<(), RepoError>;

    /// Other threads sharing at least one neighbour with `thread_id`, ordered
    /// by shared count descending then thread id ascending.
    async fn shared_neighbor_counts(&self, thread_id: i64)
    -> Result<Vec<SimilarityEdge>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}
