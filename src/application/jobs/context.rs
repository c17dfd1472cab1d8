use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::{aggregator::ViewAggregator, trending::TrendingService};

/// Shared context handed to job workers. Every handle owns its own pool or
/// connection manager, independent of the request path.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub aggregator: Arc<ViewAggregator>,
    pub trending: Arc<TrendingService>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
