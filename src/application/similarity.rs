//! Related threads ranked by shared tags and categories.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::application::repos::{ForumRepo, GraphRepo, RepoError};
use crate::domain::entities::{SimilarThread, SimilarityEdge, ThreadRecord};

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("thread {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct SimilarityService {
    forum: Arc<dyn ForumRepo>,
    graph: Arc<dyn GraphRepo>,
}

impl SimilarityService {
    pub fn new(forum: Arc<dyn ForumRepo>, graph: Arc<dyn GraphRepo>) -> Self {
        Self { forum, graph }
    }

    /// Up to `limit` threads sharing the most neighbours with `thread_id`.
    ///
    /// Candidates are consumed one shared-count group at a time, highest
    /// first. Inside a group the most recently updated threads come first.
    /// Groups are appended until `limit` is reached, then the tail is cut.
    /// Graph or enrichment failures degrade to an empty list; an unknown
    /// source thread is an error.
    pub async fn get_similar(
        &self,
        thread_id: i64,
        limit: usize,
    ) -> Result<Vec<SimilarThread>, SimilarityError> {
        if self.forum.find_thread(thread_id).await?.is_none() {
            return Err(SimilarityError::NotFound(thread_id));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let edges = match self.graph.shared_neighbor_counts(thread_id).await {
            Ok(edges) => edges,
            Err(err) => {
                warn!(
                    target = "application::similarity",
                    thread_id,
                    error = %err,
                    "graph query failed; serving no similar threads"
                );
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::with_capacity(limit);
        for group in score_groups(edges, thread_id) {
            let shared_count = group[0].shared_count;
            let ids: Vec<i64> = group.iter().map(|edge| edge.thread_id).collect();
            let threads = match self.forum.list_threads_by_ids(&ids).await {
                Ok(threads) => threads,
                Err(err) => {
                    warn!(
                        target = "application::similarity",
                        thread_id,
                        error = %err,
                        "thread lookup failed; serving no similar threads"
                    );
                    return Ok(Vec::new());
                }
            };

            results.extend(order_group(threads, shared_count));
            if results.len() >= limit {
                break;
            }
        }

        results.truncate(limit);
        Ok(results)
    }
}

/// Splits edges into descending shared-count groups, dropping the source
/// thread and non-positive counts.
fn score_groups(mut edges: Vec<SimilarityEdge>, source: i64) -> Vec<Vec<SimilarityEdge>> {
    edges.retain(|edge| edge.thread_id != source && edge.shared_count > 0);
    edges.sort_by(|a, b| {
        b.shared_count
            .cmp(&a.shared_count)
            .then_with(|| a.thread_id.cmp(&b.thread_id))
    });

    let mut groups: Vec<Vec<SimilarityEdge>> = Vec::new();
    for edge in edges {
        match groups.last_mut() {
            Some(group) if group[0].shared_count == edge.shared_count => group.push(edge),
            _ => groups.push(vec![edge]),
        }
    }
    groups
}

/// Most recently updated first, thread id ascending on equal timestamps.
/// Threads missing from the relational store are skipped.
fn order_group(threads: Vec<ThreadRecord>, shared_count: i64) -> Vec<SimilarThread> {
    let mut ordered = threads;
    ordered.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered.dedup_by_key(|thread| thread.id);

    ordered
        .into_iter()
        .map(|thread| SimilarThread {
            thread_id: thread.id,
            title: thread.title,
            shared_count,
            updated_at: thread.updated_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn edge(thread_id: i64, shared_count: i64) -> SimilarityEdge {
        SimilarityEdge {
            thread_id,
            shared_count,
        }
    }

    #[test]
    fn groups_follow_descending_counts() {
        let groups = score_groups(
            vec![edge(4, 1), edge(2, 3), edge(7, 1), edge(9, 3), edge(1, 2)],
            99,
        );
        let shape: Vec<(i64, usize)> = groups
            .iter()
            .map(|group| (group[0].shared_count, group.len()))
            .collect();
        assert_eq!(shape, vec![(3, 2), (2, 1), (1, 2)]);
    }

    #[test]
    fn groups_exclude_source_and_empty_counts() {
        let groups = score_groups(vec![edge(5, 2), edge(6, 0), edge(8, 1)], 5);
        let ids: Vec<i64> = groups.iter().flatten().map(|edge| edge.thread_id).collect();
        assert_eq!(ids, vec![8]);
    }

    #[test]
    fn group_orders_by_recency_then_id() {
        let thread = |id: i64, updated_at| ThreadRecord {
            id,
            title: format!("thread {id}"),
            category_id: 1,
            user_id: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at,
        };
        let ordered = order_group(
            vec![
                thread(3, datetime!(2024-02-01 00:00 UTC)),
                thread(2, datetime!(2024-03-01 00:00 UTC)),
                thread(1, datetime!(2024-02-01 00:00 UTC)),
            ],
            2,
        );
        let ids: Vec<i64> = ordered.iter().map(|similar| similar.thread_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(ordered.iter().all(|similar| similar.shared_count == 2));
    }
}
