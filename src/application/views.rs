//! View ingestion: the hot-path event buffer and its drain triggers.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::jobs::{DrainReason, enqueue_drain_views_job};
use crate::application::repos::{JobsRepo, RepoError};
use crate::cache::{CacheError, KvStore};
use crate::domain::views::{ViewEvent, ViewRecordError};

const METRIC_VIEWS_RECORDED: &str = "agora_views_recorded_total";
const METRIC_VIEWS_QUEUE_LEN: &str = "agora_views_queue_len";

const DEFAULT_QUEUE_KEY: &str = "thread_views_queue";
const DEFAULT_DRAIN_THRESHOLD: usize = 100;
const DEFAULT_COLD_START_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Buffer(#[from] CacheError),
    #[error("corrupt view batch; {dead_lettered} records moved to the dead-letter list")]
    Corrupt {
        #[source]
        source: ViewRecordError,
        dead_lettered: usize,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Queue naming and drain policy.
#[derive(Debug, Clone)]
pub struct ViewQueueConfig {
    pub queue_key: String,
    /// Queue length that arms an immediate drain.
    pub drain_threshold: usize,
    /// Delay of the drain armed when the queue goes from empty to one entry.
    pub cold_start_delay: Duration,
    /// Upper bound on records moved per drain.
    pub batch_size: usize,
}

impl Default for ViewQueueConfig {
    fn default() -> Self {
        Self {
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            drain_threshold: DEFAULT_DRAIN_THRESHOLD,
            cold_start_delay: DEFAULT_COLD_START_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl From<&crate::config::ViewsSettings> for ViewQueueConfig {
    fn from(settings: &crate::config::ViewsSettings) -> Self {
        Self {
            queue_key: settings.queue_key.clone(),
            drain_threshold: settings.drain_threshold.get() as usize,
            cold_start_delay: Duration::from_secs(settings.cold_start_delay_secs.get()),
            batch_size: settings.batch_size.get() as usize,
        }
    }
}

impl ViewQueueConfig {
    pub fn dead_letter_key(&self) -> String {
        format!("{}:dead", self.queue_key)
    }
}

/// Drain armed by a queue length transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    Immediate,
    Delayed(Duration),
}

impl DrainTrigger {
    /// Only the two edges arm a drain: reaching exactly the threshold and
    /// reaching exactly one. Every length is observed by exactly one push, so
    /// concurrent producers never double-trigger. The threshold check wins
    /// when it is 1.
    pub fn for_queue_len(len: usize, config: &ViewQueueConfig) -> Option<Self> {
        let threshold = config.drain_threshold.max(1);
        if len == threshold {
            Some(DrainTrigger::Immediate)
        } else if len == 1 {
            Some(DrainTrigger::Delayed(config.cold_start_delay))
        } else {
            None
        }
    }

    fn reason(self) -> DrainReason {
        match self {
            DrainTrigger::Immediate => DrainReason::Threshold,
            DrainTrigger::Delayed(_) => DrainReason::ColdStart,
        }
    }
}

/// Fire-and-forget view recording.
///
/// Content ids are not checked here; views of missing threads are dropped
/// when the batch is persisted.
#[derive(Clone)]
pub struct ViewBuffer {
    store: Arc<dyn KvStore>,
    jobs: Arc<dyn JobsRepo>,
    config: ViewQueueConfig,
}

impl ViewBuffer {
    pub fn new(store: Arc<dyn KvStore>, jobs: Arc<dyn JobsRepo>, config: ViewQueueConfig) -> Self {
        Self {
            store,
            jobs,
            config,
        }
    }

    pub fn config(&self) -> &ViewQueueConfig {
        &self.config
    }

    /// Buffers a view stamped with the current time and returns the new
    /// queue length.
    pub async fn record(&self, content_id: i64) -> Result<usize, ViewError> {
        self.record_event(ViewEvent::now(content_id)).await
    }

    pub async fn record_event(&self, event: ViewEvent) -> Result<usize, ViewError> {
        let len = self
            .store
            .list_push(&self.config.queue_key, &event.encode())
            .await?;
        counter!(METRIC_VIEWS_RECORDED).increment(1);
        gauge!(METRIC_VIEWS_QUEUE_LEN).set(len as f64);

        if let Some(trigger) = DrainTrigger::for_queue_len(len, &self.config) {
            self.dispatch(trigger, len).await;
        }

        Ok(len)
    }

    pub async fn queue_len(&self) -> Result<usize, ViewError> {
        Ok(self.store.list_len(&self.config.queue_key).await?)
    }

    // The view is already buffered when dispatch fails; the next armed
    // trigger or a manual drain picks it up.
    async fn dispatch(&self, trigger: DrainTrigger, len: usize) {
        let run_at = match trigger {
            DrainTrigger::Immediate => None,
            DrainTrigger::Delayed(delay) => Some(OffsetDateTime::now_utc() + delay),
        };

        match enqueue_drain_views_job(self.jobs.as_ref(), trigger.reason(), run_at).await {
            Ok(job_id) => debug!(
                target = "application::views::ViewBuffer",
                job_id = %job_id,
                queue_len = len,
                trigger = ?trigger,
                "drain job dispatched"
            ),
            Err(err) => warn!(
                target = "application::views::ViewBuffer",
                error = %err,
                queue_len = len,
                trigger = ?trigger,
                "failed to dispatch drain job"
            ),
        }
    }
}
