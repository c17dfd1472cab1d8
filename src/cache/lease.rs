//! Lease tokens guarding background tasks against overlapping runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::keys::{lease_key, namespaced};
use super::store::{CacheError, KvStore};

/// A held lease. Dropping it without [`Lease::release`] leaves the key to
/// expire on its TTL.
pub struct Lease {
    store: Arc<dyn KvStore>,
    key: String,
    token: String,
}

impl Lease {
    /// Tries to take the lease for `task`. `Ok(None)` means another holder
    /// owns it.
    pub async fn acquire(
        store: Arc<dyn KvStore>,
        prefix: &str,
        task: &str,
        ttl: Duration,
    ) -> Result<Option<Self>, CacheError> {
        let key = namespaced(prefix, &lease_key(task));
        let token = Uuid::new_v4().to_string();

        if !store.set_if_absent(&key, &token, ttl).await? {
            debug!(target = "cache::lease", key = %key, "lease already held");
            return Ok(None);
        }

        Ok(Some(Self { store, key, token }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the lease if it is still ours. Returns false when it had
    /// already expired or been taken over.
    pub async fn release(self) -> Result<bool, CacheError> {
        let released = self.store.delete_if_equals(&self.key, &self.token).await?;
        if !released {
            warn!(
                target = "cache::lease",
                key = %self.key,
                "lease expired before release; run exceeded its ttl"
            );
        }
        Ok(released)
    }
}
