//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::NeighborKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub title: String,
    /// 0 for root categories, 1 for their children.
    pub level: i16,
    pub parent_id: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: i64,
    pub title: String,
    pub category_id: i64,
    pub user_id: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Association between a thread and a tag. The pair is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadTagRecord {
    pub thread_id: i64,
    pub tag_id: i64,
}

/// Child category as shown on the homepage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomepageCategory {
    pub id: i64,
    pub title: String,
    pub thread_count: i64,
    pub updated_at: OffsetDateTime,
}

/// Root category with its children, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomepageSection {
    pub id: i64,
    pub title: String,
    pub children: Vec<HomepageCategory>,
}

/// Structural neighbour of a thread in the graph store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphNeighbor {
    pub kind: NeighborKind,
    pub key: String,
}

impl GraphNeighbor {
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            kind: NeighborKind::Tag,
            key: name.into(),
        }
    }

    pub fn category(id: i64) -> Self {
        Self {
            kind: NeighborKind::Category,
            key: id.to_string(),
        }
    }
}

/// Candidate thread sharing `shared_count` neighbours with a source thread.
///
/// Derived per query, never stored. `shared_count` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub thread_id: i64,
    pub shared_count: i64,
}

/// Related thread as returned to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarThread {
    pub thread_id: i64,
    pub title: String,
    pub shared_count: i64,
    pub updated_at: OffsetDateTime,
}
