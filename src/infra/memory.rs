//! Process-local repositories.
//!
//! They implement the same traits as the Postgres and graph adapters and are
//! used by the test suite and for single-node experiments. Trending
//! snapshots are computed with [`materialize`] and swapped in whole, so
//! readers never observe a half-built ranking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CreateCategoryParams, CreateTagParams, CreateThreadParams, ForumRepo, GraphRepo, JobsRepo,
    NewJobRecord, RepoError, TagsRepo, TagsWriteRepo, TrendingRepo, ViewEventsRepo,
};
use crate::cache::lock::{mutex_lock, rw_read, rw_write};
use crate::domain::entities::{
    CategoryRecord, GraphNeighbor, HomepageCategory, HomepageSection, SimilarityEdge, TagRecord,
    ThreadRecord,
};
use crate::domain::forum::{CHILD_LEVEL, ROOT_LEVEL};
use crate::domain::trending::{TrendingSnapshot, materialize};
use crate::domain::views::ViewEvent;

const SOURCE: &str = "infra::memory";

#[derive(Default)]
struct ForumTables {
    categories: BTreeMap<i64, CategoryRecord>,
    threads: BTreeMap<i64, ThreadRecord>,
    tags: BTreeMap<i64, TagRecord>,
    thread_tags: BTreeSet<(i64, i64)>,
    views: Vec<ViewEvent>,
}

/// In-memory relational store plus a recording job queue.
pub struct MemoryRepositories {
    tables: RwLock<ForumTables>,
    snapshot: RwLock<Arc<TrendingSnapshot>>,
    jobs: Mutex<Vec<(String, NewJobRecord)>>,
    next_id: AtomicI64,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self {
            tables: RwLock::new(ForumTables::default()),
            snapshot: RwLock::new(Arc::new(TrendingSnapshot::empty())),
            jobs: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Jobs enqueued so far, oldest first.
    pub fn enqueued_jobs(&self) -> Vec<NewJobRecord> {
        mutex_lock(&self.jobs, SOURCE, "enqueued_jobs")
            .iter()
            .map(|(_, job)| job.clone())
            .collect()
    }

    /// Removes and returns every enqueued job.
    pub fn take_jobs(&self) -> Vec<NewJobRecord> {
        mutex_lock(&self.jobs, SOURCE, "take_jobs")
            .drain(..)
            .map(|(_, job)| job)
            .collect()
    }
}

#[async_trait]
impl ForumRepo for MemoryRepositories {
    async fn find_thread(&self, id: i64) -> Result<Option<ThreadRecord>, RepoError> {
        Ok(rw_read(&self.tables, SOURCE, "find_thread")
            .threads
            .get(&id)
            .cloned())
    }

    async fn list_threads_by_ids(&self, ids: &[i64]) -> Result<Vec<ThreadRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_threads_by_ids");
        Ok(ids
            .iter()
            .filter_map(|id| tables.threads.get(id).cloned())
            .collect())
    }

    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(rw_read(&self.tables, SOURCE, "find_category")
            .categories
            .get(&id)
            .cloned())
    }

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_category");
        if let Some(parent_id) = params.parent_id {
            if !tables.categories.contains_key(&parent_id) {
                return Err(RepoError::InvalidInput {
                    message: format!("parent category {parent_id} does not exist"),
                });
            }
        }

        let now = OffsetDateTime::now_utc();
        let record = CategoryRecord {
            id: self.next_id(),
            title: params.title,
            level: params.level,
            parent_id: params.parent_id,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_thread(&self, params: CreateThreadParams) -> Result<ThreadRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_thread");
        let now = OffsetDateTime::now_utc();

        let Some(category) = tables.categories.get_mut(&params.category_id) else {
            return Err(RepoError::InvalidInput {
                message: format!("category {} does not exist", params.category_id),
            });
        };
        category.updated_at = now;

        let record = ThreadRecord {
            id: self.next_id(),
            title: params.title,
            category_id: params.category_id,
            user_id: params.user_id,
            created_at: now,
            updated_at: now,
        };
        tables.threads.insert(record.id, record.clone());
        Ok(record)
    }

    async fn load_homepage(&self) -> Result<Vec<HomepageSection>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "load_homepage");

        let mut thread_counts: HashMap<i64, i64> = HashMap::new();
        for thread in tables.threads.values() {
            *thread_counts.entry(thread.category_id).or_default() += 1;
        }

        let sections = tables
            .categories
            .values()
            .filter(|category| category.level == ROOT_LEVEL)
            .map(|root| HomepageSection {
                id: root.id,
                title: root.title.clone(),
                children: tables
                    .categories
                    .values()
                    .filter(|child| child.level == CHILD_LEVEL && child.parent_id == Some(root.id))
                    .map(|child| HomepageCategory {
                        id: child.id,
                        title: child.title.clone(),
                        thread_count: thread_counts.get(&child.id).copied().unwrap_or(0),
                        updated_at: child.updated_at,
                    })
                    .collect(),
            })
            .collect();

        Ok(sections)
    }
}

#[async_trait]
impl TagsRepo for MemoryRepositories {
    async fn list_all(&self) -> Result<Vec<TagRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_all_tags");
        let mut tags: Vec<TagRecord> = tables.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(tags)
    }

    async fn list_for_thread(&self, thread_id: i64) -> Result<Vec<TagRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_tags_for_thread");
        let mut tags: Vec<TagRecord> = tables
            .thread_tags
            .range((thread_id, i64::MIN)..=(thread_id, i64::MAX))
            .filter_map(|(_, tag_id)| tables.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(tags)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TagRecord>, RepoError> {
        Ok(rw_read(&self.tables, SOURCE, "find_tag")
            .tags
            .get(&id)
            .cloned())
    }
}

#[async_trait]
impl TagsWriteRepo for MemoryRepositories {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_tag");
        if tables.tags.values().any(|tag| tag.name == params.name) {
            return Err(RepoError::Duplicate {
                constraint: "tags_name_key".to_string(),
            });
        }

        let record = TagRecord {
            id: self.next_id(),
            name: params.name,
            description: params.description,
        };
        tables.tags.insert(record.id, record.clone());
        Ok(record)
    }

    async fn assign_tag(&self, thread_id: i64, tag_id: i64) -> Result<bool, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "assign_tag");
        if !tables.threads.contains_key(&thread_id) || !tables.tags.contains_key(&tag_id) {
            return Err(RepoError::InvalidInput {
                message: format!("thread {thread_id} or tag {tag_id} does not exist"),
            });
        }
        Ok(tables.thread_tags.insert((thread_id, tag_id)))
    }
}

#[async_trait]
impl ViewEventsRepo for MemoryRepositories {
    async fn insert_batch(&self, events: &[ViewEvent]) -> Result<u64, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "insert_views");
        let kept: Vec<ViewEvent> = events
            .iter()
            .filter(|event| tables.threads.contains_key(&event.content_id))
            .copied()
            .collect();
        let written = kept.len() as u64;
        tables.views.extend(kept);
        Ok(written)
    }

    async fn count_events(&self) -> Result<u64, RepoError> {
        Ok(rw_read(&self.tables, SOURCE, "count_views").views.len() as u64)
    }
}

#[async_trait]
impl TrendingRepo for MemoryRepositories {
    async fn refresh_snapshot(&self) -> Result<(), RepoError> {
        let fresh = {
            let tables = rw_read(&self.tables, SOURCE, "refresh_snapshot");
            materialize(tables.views.iter(), OffsetDateTime::now_utc())
        };
        *rw_write(&self.snapshot, SOURCE, "swap_snapshot") = Arc::new(fresh);
        Ok(())
    }

    async fn load_snapshot(&self, limit: usize) -> Result<TrendingSnapshot, RepoError> {
        let current = rw_read(&self.snapshot, SOURCE, "load_snapshot").clone();
        Ok(TrendingSnapshot {
            entries: current.top(limit),
            refreshed_at: current.refreshed_at,
        })
    }
}

#[async_trait]
impl JobsRepo for MemoryRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id = format!("memory-{}", self.next_id());
        mutex_lock(&self.jobs, SOURCE, "enqueue_job").push((id.clone(), job));
        Ok(id)
    }
}

/// In-memory graph: neighbour sets per thread.
#[derive(Default)]
pub struct MemoryGraph {
    edges: RwLock<BTreeMap<i64, BTreeSet<GraphNeighbor>>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphRepo for MemoryGraph {
    async fn merge_thread(
        &self,
        thread_id: i64,
        neighbors: &[GraphNeighbor],
    ) -> Result<(), RepoError> {
        let mut edges = rw_write(&self.edges, SOURCE, "merge_thread");
        edges
            .entry(thread_id)
            .or_default()
            .extend(neighbors.iter().cloned());
        Ok(())
    }

    async fn shared_neighbor_counts(
        &self,
        thread_id: i64,
    ) -> Result<Vec<SimilarityEdge>, RepoError> {
        let edges = rw_read(&self.edges, SOURCE, "shared_neighbor_counts");
        let Some(source) = edges.get(&thread_id) else {
            return Ok(Vec::new());
        };

        let mut shared: Vec<SimilarityEdge> = edges
            .iter()
            .filter(|(other, _)| **other != thread_id)
            .map(|(other, neighbors)| SimilarityEdge {
                thread_id: *other,
                shared_count: neighbors.intersection(source).count() as i64,
            })
            .filter(|edge| edge.shared_count > 0)
            .collect();
        shared.sort_by(|a, b| {
            b.shared_count
                .cmp(&a.shared_count)
                .then(a.thread_id.cmp(&b.thread_id))
        });
        Ok(shared)
    }
}
