use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "agora_cache_hit_total",
            Unit::Count,
            "Cache-aside reads served from the key/value store."
        );
        describe_counter!(
            "agora_cache_miss_total",
            Unit::Count,
            "Cache-aside reads that fell through to the source of truth."
        );
        describe_counter!(
            "agora_cache_evict_total",
            Unit::Count,
            "Cache keys removed by write-path invalidation."
        );
        describe_counter!(
            "agora_views_recorded_total",
            Unit::Count,
            "View events appended to the buffer."
        );
        describe_counter!(
            "agora_views_persisted_total",
            Unit::Count,
            "View events written to the relational store."
        );
        describe_gauge!(
            "agora_views_queue_len",
            Unit::Count,
            "Buffered view events observed at the last append."
        );
        describe_histogram!(
            "agora_views_drain_ms",
            Unit::Milliseconds,
            "Latency of one buffer drain in milliseconds."
        );
        describe_histogram!(
            "agora_trending_refresh_ms",
            Unit::Milliseconds,
            "Latency of the trending snapshot refresh in milliseconds."
        );
    });
}
