use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::{
        aggregator::DrainOutcome,
        repos::{JobsRepo, RepoError},
    },
    domain::types::JobType,
};

use super::{
    context::{JobWorkerContext, job_failed},
    queue::enqueue_job,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainReason {
    /// The queue reached the drain threshold.
    Threshold,
    /// First view after the queue was empty.
    ColdStart,
    Manual,
}

impl DrainReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DrainReason::Threshold => "threshold",
            DrainReason::ColdStart => "cold_start",
            DrainReason::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainViewsJobPayload {
    pub reason: DrainReason,
}

/// Drains are not retried: a failed batch stays in the queue (or in the
/// dead-letter list) and the next trigger moves it.
pub async fn enqueue_drain_views_job<J: JobsRepo + ?Sized>(
    repo: &J,
    reason: DrainReason,
    run_at: Option<OffsetDateTime>,
) -> Result<String, RepoError> {
    let payload = DrainViewsJobPayload { reason };
    enqueue_job(repo, JobType::DrainViews, &payload, run_at, 1, 5).await
}

pub async fn process_drain_views_job(
    payload: DrainViewsJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    let outcome = ctx
        .aggregator
        .drain_and_persist()
        .await
        .map_err(job_failed)?;

    match outcome {
        DrainOutcome::Empty => info!(
            target = "application::jobs::process_drain_views_job",
            reason = payload.reason.as_str(),
            "no views to process"
        ),
        DrainOutcome::Persisted { taken, written } => info!(
            target = "application::jobs::process_drain_views_job",
            reason = payload.reason.as_str(),
            taken,
            written,
            "views drained"
        ),
    }

    Ok(())
}
