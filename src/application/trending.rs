//! Trending materialization and reads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::repos::{RepoError, TrendingRepo};
use crate::cache::{CacheAside, CacheError, CacheKey, Lease};
use crate::domain::trending::{TRENDING_TOP_N, TrendingEntry, TrendingSnapshot};

const METRIC_TRENDING_REFRESH_MS: &str = "agora_trending_refresh_ms";
const REFRESH_TASK: &str = "refresh_trending";

#[derive(Debug, Error)]
pub enum TrendingError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Another refresh holds the lease.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TrendingConfig {
    pub cache_ttl: Duration,
    pub lease_ttl: Duration,
    pub key_prefix: String,
}

#[derive(Clone)]
pub struct TrendingService {
    repo: Arc<dyn TrendingRepo>,
    cache: CacheAside,
    config: TrendingConfig,
}

impl TrendingService {
    pub fn new(repo: Arc<dyn TrendingRepo>, cache: CacheAside, config: TrendingConfig) -> Self {
        Self {
            repo,
            cache,
            config,
        }
    }

    /// Recomputes the snapshot unless another refresh is running, then drops
    /// the cached copy so the next read sees the new ranking.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<RefreshOutcome, TrendingError> {
        let Some(lease) = Lease::acquire(
            self.cache.store().clone(),
            &self.config.key_prefix,
            REFRESH_TASK,
            self.config.lease_ttl,
        )
        .await?
        else {
            info!(
                target = "application::trending",
                "refresh already running; skipping"
            );
            return Ok(RefreshOutcome::Skipped);
        };

        let started_at = Instant::now();
        let result = self.repo.refresh_snapshot().await;

        if let Err(err) = lease.release().await {
            warn!(
                target = "application::trending",
                error = %err,
                "failed to release refresh lease; it will expire on its ttl"
            );
        }
        result?;

        self.cache.invalidate(&CacheKey::Trending).await?;

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_TRENDING_REFRESH_MS).record(elapsed_ms);
        info!(
            target = "application::trending",
            elapsed_ms,
            "trending snapshot refreshed"
        );

        Ok(RefreshOutcome::Refreshed)
    }

    /// Top `limit` entries of the current snapshot, never more than the
    /// snapshot size. Falls back to an empty list when the store is down.
    pub async fn get_trending(&self, limit: usize) -> Vec<TrendingEntry> {
        match self.snapshot().await {
            Ok(snapshot) => snapshot.top(limit),
            Err(err) => {
                warn!(
                    target = "application::trending",
                    error = %err,
                    "trending unavailable; serving empty list"
                );
                Vec::new()
            }
        }
    }

    pub async fn snapshot(&self) -> Result<TrendingSnapshot, TrendingError> {
        let repo = self.repo.clone();
        self.cache
            .get_or_compute(&CacheKey::Trending, self.config.cache_ttl, || async move {
                repo.load_snapshot(TRENDING_TOP_N)
                    .await
                    .map_err(TrendingError::from)
            })
            .await
    }
}
