//! Cache key definitions.
//!
//! Keys render to flat strings; the configured prefix is applied by the
//! store-facing wrappers so the same key can be rendered in any namespace.

use std::fmt;

/// Cached read models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Every tag, ordered by name.
    AllTags,
    /// Tags attached to a thread.
    ThreadTags(i64),
    /// Root categories with their children and thread counts.
    Homepage,
    /// Materialized trending snapshot.
    Trending,
}

impl CacheKey {
    pub fn render(&self) -> String {
        match self {
            CacheKey::AllTags => "tags:all".to_string(),
            CacheKey::ThreadTags(thread_id) => format!("thread-tags:{thread_id}"),
            CacheKey::Homepage => "homepage".to_string(),
            CacheKey::Trending => "trending".to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Mutual-exclusion token keyed by background task name.
pub fn lease_key(task: &str) -> String {
    format!("lease:{task}")
}

/// Joins `prefix` and `key` with `:`; an empty prefix leaves the key untouched.
pub fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}
