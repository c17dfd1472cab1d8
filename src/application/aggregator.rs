//! Batch persistence of buffered view events.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{error, info, instrument};

use crate::application::repos::ViewEventsRepo;
use crate::application::views::{ViewError, ViewQueueConfig};
use crate::cache::KvStore;
use crate::domain::views::parse_batch;

const METRIC_VIEWS_PERSISTED: &str = "agora_views_persisted_total";
const METRIC_VIEWS_DRAIN_MS: &str = "agora_views_drain_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue held nothing to process.
    Empty,
    /// `taken` records left the queue; `written` of them referenced existing
    /// threads and were stored.
    Persisted { taken: usize, written: u64 },
}

/// Moves the oldest buffered views into the durable event store.
///
/// The take is a single atomic range pop, so concurrent drains work on
/// disjoint slices and cannot double-count.
#[derive(Clone)]
pub struct ViewAggregator {
    store: Arc<dyn KvStore>,
    events: Arc<dyn ViewEventsRepo>,
    config: ViewQueueConfig,
}

impl ViewAggregator {
    pub fn new(
        store: Arc<dyn KvStore>,
        events: Arc<dyn ViewEventsRepo>,
        config: ViewQueueConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    #[instrument(skip(self), fields(queue = %self.config.queue_key))]
    pub async fn drain_and_persist(&self) -> Result<DrainOutcome, ViewError> {
        let started_at = Instant::now();
        let queue = &self.config.queue_key;

        let records = self
            .store
            .list_take_oldest(queue, self.config.batch_size)
            .await?;
        if records.is_empty() {
            return Ok(DrainOutcome::Empty);
        }

        let events = match parse_batch(&records) {
            Ok(events) => events,
            Err(source) => {
                let dead_letter = self.config.dead_letter_key();
                let dead_lettered = match self.store.list_push_many(&dead_letter, &records).await {
                    Ok(_) => records.len(),
                    Err(err) => {
                        error!(
                            target = "application::aggregator",
                            error = %err,
                            dead_letter = %dead_letter,
                            records = records.len(),
                            "dead-letter push failed; corrupt batch dropped"
                        );
                        0
                    }
                };
                error!(
                    target = "application::aggregator",
                    error = %source,
                    records = records.len(),
                    dead_letter = %dead_letter,
                    "corrupt view batch rejected"
                );
                return Err(ViewError::Corrupt {
                    source,
                    dead_lettered,
                });
            }
        };

        let written = match self.events.insert_batch(&events).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(requeue_err) = self.store.list_requeue(queue, &records).await {
                    error!(
                        target = "application::aggregator",
                        error = %requeue_err,
                        records = records.len(),
                        "failed to requeue views after insert failure; batch lost"
                    );
                }
                return Err(err.into());
            }
        };

        counter!(METRIC_VIEWS_PERSISTED).increment(written);
        histogram!(METRIC_VIEWS_DRAIN_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "application::aggregator",
            taken = records.len(),
            written,
            dropped = records.len() as u64 - written.min(records.len() as u64),
            "view batch persisted"
        );

        Ok(DrainOutcome::Persisted {
            taken: records.len(),
            written,
        })
    }

    /// Drains batch after batch until one comes back short. Returns the total
    /// number of stored events.
    pub async fn drain_all(&self) -> Result<u64, ViewError> {
        let mut total = 0;
        loop {
            match self.drain_and_persist().await? {
                DrainOutcome::Empty => break,
                DrainOutcome::Persisted { taken, written } => {
                    total += written;
                    if taken < self.config.batch_size {
                        break;
                    }
                }
            }
        }
        Ok(total)
    }
}
