//! Key/value store abstraction behind the cache, the view buffer and leases.
//!
//! [`KvStore`] covers the primitives those callers need: string values with
//! TTL, conditional set/delete for leases, and list operations for the view
//! queue. Lists follow Redis semantics: pushes land at the head, so the
//! oldest element sits at the tail.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache value codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("key `{key}` holds a value of the wrong type")]
    WrongType { key: String },
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<usize, CacheError>;

    /// Sets `key` only when it does not exist yet. Returns whether it was set.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Deletes `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError>;

    /// Pushes to the head of the list and returns the new length.
    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CacheError>;

    /// Pushes every value to the head, in order. Returns the new length.
    async fn list_push_many(&self, key: &str, values: &[String]) -> Result<usize, CacheError>;

    async fn list_len(&self, key: &str) -> Result<usize, CacheError>;

    /// Atomically removes and returns up to `count` elements from the tail.
    ///
    /// Elements come back in list order (newest first, oldest last), so
    /// [`KvStore::list_requeue`] with the same slice restores the list.
    async fn list_take_oldest(&self, key: &str, count: usize) -> Result<Vec<String>, CacheError>;

    /// Appends `values` back at the tail, in order.
    async fn list_requeue(&self, key: &str, values: &[String]) -> Result<usize, CacheError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Process-local [`KvStore`] used by tests and single-node deployments.
///
/// Expiry is measured on the tokio clock so paused-time tests can advance it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_live_slots<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut HashMap<String, Slot>) -> R,
    ) -> R {
        let mut slots = mutex_lock(&self.slots, SOURCE, op);
        let now = Instant::now();
        slots.retain(|_, slot| slot.is_live(now));
        f(&mut slots)
    }

    fn with_list<R>(
        &self,
        key: &str,
        op: &'static str,
        f: impl FnOnce(&mut VecDeque<String>) -> R,
    ) -> Result<R, CacheError> {
        self.with_live_slots(op, |slots| {
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut slot.value {
                Value::List(list) => {
                    let result = f(list);
                    if list.is_empty() {
                        slots.remove(key);
                    }
                    Ok(result)
                }
                Value::Str(_) => Err(CacheError::WrongType {
                    key: key.to_string(),
                }),
            }
        })
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_live_slots("get", |slots| match slots.get(key) {
            None => Ok(None),
            Some(Slot {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.with_live_slots("set", |slots| {
            slots.insert(
                key.to_string(),
                Slot {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<usize, CacheError> {
        Ok(self.with_live_slots("delete", |slots| {
            usize::from(slots.remove(key).is_some())
        }))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        Ok(self.with_live_slots("set_if_absent", |slots| {
            if slots.contains_key(key) {
                return false;
            }
            slots.insert(
                key.to_string(),
                Slot {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            true
        }))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        Ok(self.with_live_slots("delete_if_equals", |slots| {
            let matches = matches!(
                slots.get(key),
                Some(Slot { value: Value::Str(current), .. }) if current == expected
            );
            if matches {
                slots.remove(key);
            }
            matches
        }))
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        self.with_list(key, "list_push", |list| {
            list.push_front(value.to_string());
            list.len()
        })
    }

    async fn list_push_many(&self, key: &str, values: &[String]) -> Result<usize, CacheError> {
        self.with_list(key, "list_push_many", |list| {
            for value in values {
                list.push_front(value.clone());
            }
            list.len()
        })
    }

    async fn list_len(&self, key: &str) -> Result<usize, CacheError> {
        self.with_live_slots("list_len", |slots| match slots.get(key) {
            None => Ok(0),
            Some(Slot {
                value: Value::List(list),
                ..
            }) => Ok(list.len()),
            Some(_) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        })
    }

    async fn list_take_oldest(&self, key: &str, count: usize) -> Result<Vec<String>, CacheError> {
        self.with_list(key, "list_take_oldest", |list| {
            let start = list.len().saturating_sub(count);
            list.split_off(start).into_iter().collect()
        })
    }

    async fn list_requeue(&self, key: &str, values: &[String]) -> Result<usize, CacheError> {
        self.with_list(key, "list_requeue", |list| {
            list.extend(values.iter().cloned());
            list.len()
        })
    }
}
