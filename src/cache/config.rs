//! Cache configuration.
//!
//! TTLs for every cached read plus the key namespace shared by all entries.

use std::time::Duration;

use crate::config::{
    DEFAULT_CACHE_HOMEPAGE_TTL_SECS, DEFAULT_CACHE_KEY_PREFIX, DEFAULT_CACHE_TAGS_TTL_SECS,
    DEFAULT_CACHE_THREAD_TAGS_TTL_SECS, DEFAULT_CACHE_TRENDING_TTL_SECS,
};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace prepended to every key, joined with `:`. Empty disables it.
    pub key_prefix: String,
    pub tags_ttl_secs: u64,
    pub thread_tags_ttl_secs: u64,
    pub homepage_ttl_secs: u64,
    pub trending_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
            tags_ttl_secs: DEFAULT_CACHE_TAGS_TTL_SECS,
            thread_tags_ttl_secs: DEFAULT_CACHE_THREAD_TAGS_TTL_SECS,
            homepage_ttl_secs: DEFAULT_CACHE_HOMEPAGE_TTL_SECS,
            trending_ttl_secs: DEFAULT_CACHE_TRENDING_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            key_prefix: settings.key_prefix.clone(),
            tags_ttl_secs: settings.tags_ttl_secs.get(),
            thread_tags_ttl_secs: settings.thread_tags_ttl_secs.get(),
            homepage_ttl_secs: settings.homepage_ttl_secs.get(),
            trending_ttl_secs: settings.trending_ttl_secs.get(),
        }
    }
}

impl CacheConfig {
    pub fn tags_ttl(&self) -> Duration {
        non_zero_secs(self.tags_ttl_secs)
    }

    pub fn thread_tags_ttl(&self) -> Duration {
        non_zero_secs(self.thread_tags_ttl_secs)
    }

    pub fn homepage_ttl(&self) -> Duration {
        non_zero_secs(self.homepage_ttl_secs)
    }

    pub fn trending_ttl(&self) -> Duration {
        non_zero_secs(self.trending_ttl_secs)
    }
}

/// Clamps to one second; a zero TTL would make entries immortal in Redis.
fn non_zero_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.key_prefix, "agora");
        assert_eq!(config.tags_ttl(), Duration::from_secs(21_600));
        assert_eq!(config.thread_tags_ttl(), Duration::from_secs(21_600));
        assert_eq!(config.homepage_ttl(), Duration::from_secs(1_800));
        assert_eq!(config.trending_ttl(), Duration::from_secs(3_600));
    }

    #[test]
    fn zero_ttl_is_clamped() {
        let config = CacheConfig {
            homepage_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.homepage_ttl(), Duration::from_secs(1));
    }
}
