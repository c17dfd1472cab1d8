mod context;
mod queue;
mod trending;
mod views;

pub use context::{JobWorkerContext, job_failed};
pub use queue::enqueue_job;
pub use trending::{
    DEFAULT_REFRESH_TRENDING_CRON, RefreshTrendingJobPayload, RefreshTrendingTick,
    enqueue_refresh_trending_job, process_refresh_trending_job, process_refresh_trending_tick,
    refresh_trending_schedule,
};
pub use views::{
    DrainReason, DrainViewsJobPayload, enqueue_drain_views_job, process_drain_views_job,
};
