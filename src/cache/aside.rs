//! Cache-aside reads and explicit invalidation over a [`KvStore`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::keys::{CacheKey, namespaced};
use super::store::{CacheError, KvStore};

const METRIC_CACHE_HIT: &str = "agora_cache_hit_total";
const METRIC_CACHE_MISS: &str = "agora_cache_miss_total";
const METRIC_CACHE_EVICT: &str = "agora_cache_evict_total";

/// Read-through cache shared by every service that caches a read model.
///
/// Values are stored as JSON, so ordered collections keep their order.
/// Store failures on the read path degrade to a miss; the source of truth is
/// always consulted in that case.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn full_key(&self, key: &CacheKey) -> String {
        namespaced(&self.prefix, &key.render())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        let raw = self.store.get(&self.full_key(key)).await?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(CacheError::from))
            .transpose()
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(value)?;
        self.store.set(&self.full_key(key), &encoded, ttl).await
    }

    /// Returns the cached value or computes, stores and returns a fresh one.
    ///
    /// Errors from `compute` propagate unchanged. A concurrent miss on the
    /// same key recomputes too; both writes carry the same data.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => {
                counter!(METRIC_CACHE_HIT, "key" => key_label(key)).increment(1);
                debug!(target = "cache::aside", key = %key, "cache hit");
                return Ok(value);
            }
            Ok(None) => {}
            Err(err @ CacheError::Codec(_)) => {
                warn!(
                    target = "cache::aside",
                    key = %key,
                    error = %err,
                    "discarding undecodable cache entry"
                );
                if let Err(err) = self.store.delete(&self.full_key(key)).await {
                    warn!(
                        target = "cache::aside",
                        key = %key,
                        error = %err,
                        "failed to evict undecodable cache entry"
                    );
                }
            }
            Err(err) => {
                warn!(
                    target = "cache::aside",
                    key = %key,
                    error = %err,
                    "cache read failed; falling back to source"
                );
            }
        }

        counter!(METRIC_CACHE_MISS, "key" => key_label(key)).increment(1);
        let value = compute().await?;

        if let Err(err) = self.set(key, &value, ttl).await {
            warn!(
                target = "cache::aside",
                key = %key,
                error = %err,
                "failed to populate cache"
            );
        }

        Ok(value)
    }

    /// Evicts `key`, returning how many entries were removed.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<usize, CacheError> {
        let removed = self.store.delete(&self.full_key(key)).await?;
        counter!(METRIC_CACHE_EVICT, "key" => key_label(key)).increment(removed as u64);
        debug!(target = "cache::aside", key = %key, removed, "cache key invalidated");
        Ok(removed)
    }
}

fn key_label(key: &CacheKey) -> &'static str {
    match key {
        CacheKey::AllTags => "all_tags",
        CacheKey::ThreadTags(_) => "thread_tags",
        CacheKey::Homepage => "homepage",
        CacheKey::Trending => "trending",
    }
}
