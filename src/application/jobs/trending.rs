//! Periodic and on-demand trending refresh.

use std::str::FromStr;

use apalis::prelude::{Data, Error as ApalisError};
use apalis_cron::Schedule;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    application::{
        repos::{JobsRepo, RepoError},
        trending::RefreshOutcome,
    },
    domain::types::JobType,
};

use super::{
    context::{JobWorkerContext, job_failed},
    queue::enqueue_job,
};

/// Every hour, on the hour.
pub const DEFAULT_REFRESH_TRENDING_CRON: &str = "0 0 * * * *";

/// Tick emitted by the cron stream.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron.
#[derive(Default, Debug, Clone)]
pub struct RefreshTrendingTick;

impl From<chrono::DateTime<chrono::Utc>> for RefreshTrendingTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Queue message for a manual refresh, e.g. after seeding view history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshTrendingJobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn refresh_trending_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| format!("invalid cron `{expression}`: {err}"))
}

pub async fn enqueue_refresh_trending_job<J: JobsRepo + ?Sized>(
    repo: &J,
    reason: Option<String>,
) -> Result<String, RepoError> {
    let payload = RefreshTrendingJobPayload { reason };
    enqueue_job(repo, JobType::RefreshTrending, &payload, None, 1, 5).await
}

/// Cron entry point. A failed cycle is left to the next tick.
pub async fn process_refresh_trending_tick(
    _tick: RefreshTrendingTick,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_refresh(&context, "schedule").await
}

pub async fn process_refresh_trending_job(
    payload: RefreshTrendingJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_refresh(&context, payload.reason.as_deref().unwrap_or("manual")).await
}

async fn run_refresh(ctx: &JobWorkerContext, reason: &str) -> Result<(), ApalisError> {
    let outcome = ctx.trending.refresh().await.map_err(job_failed)?;
    info!(
        target = "application::jobs::refresh_trending",
        reason,
        skipped = outcome == RefreshOutcome::Skipped,
        "trending refresh finished"
    );
    Ok(())
}
