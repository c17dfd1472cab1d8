//! Key/value caching for agora.
//!
//! - [`KvStore`]: storage primitives (strings with TTL, conditional writes,
//!   lists) implemented by Redis and by [`MemoryStore`].
//! - [`CacheAside`]: read-through caching of read models with explicit
//!   invalidation on writes.
//! - [`Lease`]: token-guarded mutual exclusion for background tasks.

mod aside;
mod config;
mod keys;
mod lease;
pub(crate) mod lock;
mod store;

pub use aside::CacheAside;
pub use config::CacheConfig;
pub use keys::{CacheKey, lease_key, namespaced};
pub use lease::Lease;
pub use store::{CacheError, KvStore, MemoryStore};
