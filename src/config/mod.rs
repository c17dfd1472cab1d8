//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::jobs::{DEFAULT_REFRESH_TRENDING_CRON, refresh_trending_schedule};

pub use cli::{CliArgs, Command, MaintenanceArgs, ServeArgs, ServeOverrides, StoreOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "agora";
const ENV_PREFIX: &str = "AGORA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_GRAPH_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_REDIS_CONNECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REDIS_RETRIES: u32 = 1;
pub(crate) const DEFAULT_CACHE_KEY_PREFIX: &str = "agora";
pub(crate) const DEFAULT_CACHE_TAGS_TTL_SECS: u64 = 6 * 60 * 60;
pub(crate) const DEFAULT_CACHE_THREAD_TAGS_TTL_SECS: u64 = 6 * 60 * 60;
pub(crate) const DEFAULT_CACHE_HOMEPAGE_TTL_SECS: u64 = 30 * 60;
pub(crate) const DEFAULT_CACHE_TRENDING_TTL_SECS: u64 = 60 * 60;
const DEFAULT_VIEWS_QUEUE_KEY: &str = "thread_views_queue";
const DEFAULT_VIEWS_DRAIN_THRESHOLD: u32 = 100;
const DEFAULT_VIEWS_COLD_START_DELAY_SECS: u64 = 60;
const DEFAULT_VIEWS_BATCH_SIZE: u32 = 1000;
const DEFAULT_JOB_DRAIN_CONCURRENCY: u32 = 1;
const DEFAULT_TRENDING_LEASE_SECS: u64 = 15 * 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub graph: GraphSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub views: ViewsSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct GraphSettings {
    /// Graph store URL; `None` shares the relational database.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// `None` keeps cache and view buffer in process memory.
    pub url: Option<String>,
    pub connect_timeout: Duration,
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key_prefix: String,
    pub tags_ttl_secs: NonZeroU64,
    pub thread_tags_ttl_secs: NonZeroU64,
    pub homepage_ttl_secs: NonZeroU64,
    pub trending_ttl_secs: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct ViewsSettings {
    pub queue_key: String,
    pub drain_threshold: NonZeroU32,
    pub cold_start_delay_secs: NonZeroU64,
    pub batch_size: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub drain_concurrency: NonZeroU32,
    pub trending_cron: String,
    pub trending_lease: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::RefreshTrending(args)) | Some(Command::DrainViews(args)) => {
            raw.apply_store_overrides(&args.stores)
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    graph: RawGraphSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
    views: RawViewsSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_store_overrides(&overrides.stores);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_http_max_connections {
            self.database.http_max_connections = Some(max);
        }
        if let Some(max) = overrides.database_jobs_max_connections {
            self.database.jobs_max_connections = Some(max);
        }
        if let Some(prefix) = overrides.cache_key_prefix.as_ref() {
            self.cache.key_prefix = Some(prefix.clone());
        }
        if let Some(value) = overrides.views_drain_threshold {
            self.views.drain_threshold = Some(value);
        }
        if let Some(value) = overrides.views_batch_size {
            self.views.batch_size = Some(value);
        }
        if let Some(value) = overrides.jobs_drain_concurrency {
            self.jobs.drain_concurrency = Some(value);
        }
        if let Some(cron) = overrides.jobs_trending_cron.as_ref() {
            self.jobs.trending_cron = Some(cron.clone());
        }
    }

    fn apply_store_overrides(&mut self, overrides: &StoreOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.graph_url.as_ref() {
            self.graph.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            graph,
            redis,
            cache,
            views,
            jobs,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            graph: build_graph_settings(graph)?,
            redis: build_redis_settings(redis)?,
            cache: build_cache_settings(cache)?,
            views: build_views_settings(views)?,
            jobs: build_jobs_settings(jobs)?,
        })
    }

    /// Graph store URL, falling back to the relational database.
    pub fn graph_url(&self) -> Option<&str> {
        self.graph.url.as_deref().or(self.database.url.as_deref())
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = non_zero_u64(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs.get()),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        http_max_connections: non_zero_u32(http_value.into(), "database.http_max_connections")?,
        jobs_max_connections: non_zero_u32(jobs_value.into(), "database.jobs_max_connections")?,
    })
}

fn build_graph_settings(graph: RawGraphSettings) -> Result<GraphSettings, LoadError> {
    let max = graph
        .max_connections
        .unwrap_or(DEFAULT_GRAPH_MAX_CONNECTIONS);

    Ok(GraphSettings {
        url: non_blank(graph.url),
        max_connections: non_zero_u32(max.into(), "graph.max_connections")?,
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let timeout_ms = non_zero_u64(
        redis
            .connect_timeout_ms
            .unwrap_or(DEFAULT_REDIS_CONNECT_TIMEOUT_MS),
        "redis.connect_timeout_ms",
    )?;

    Ok(RedisSettings {
        url: non_blank(redis.url),
        connect_timeout: Duration::from_millis(timeout_ms.get()),
        retries: redis.retries.unwrap_or(DEFAULT_REDIS_RETRIES),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let key_prefix = cache
        .key_prefix
        .map(|prefix| prefix.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());

    Ok(CacheSettings {
        key_prefix,
        tags_ttl_secs: non_zero_u64(
            cache.tags_ttl_secs.unwrap_or(DEFAULT_CACHE_TAGS_TTL_SECS),
            "cache.tags_ttl_secs",
        )?,
        thread_tags_ttl_secs: non_zero_u64(
            cache
                .thread_tags_ttl_secs
                .unwrap_or(DEFAULT_CACHE_THREAD_TAGS_TTL_SECS),
            "cache.thread_tags_ttl_secs",
        )?,
        homepage_ttl_secs: non_zero_u64(
            cache
                .homepage_ttl_secs
                .unwrap_or(DEFAULT_CACHE_HOMEPAGE_TTL_SECS),
            "cache.homepage_ttl_secs",
        )?,
        trending_ttl_secs: non_zero_u64(
            cache
                .trending_ttl_secs
                .unwrap_or(DEFAULT_CACHE_TRENDING_TTL_SECS),
            "cache.trending_ttl_secs",
        )?,
    })
}

fn build_views_settings(views: RawViewsSettings) -> Result<ViewsSettings, LoadError> {
    let queue_key = non_blank(views.queue_key)
        .unwrap_or_else(|| DEFAULT_VIEWS_QUEUE_KEY.to_string());

    let drain_threshold = views
        .drain_threshold
        .unwrap_or(DEFAULT_VIEWS_DRAIN_THRESHOLD);
    let batch_size = views.batch_size.unwrap_or(DEFAULT_VIEWS_BATCH_SIZE);
    if batch_size < drain_threshold {
        return Err(LoadError::invalid(
            "views.batch_size",
            "must be at least views.drain_threshold",
        ));
    }

    Ok(ViewsSettings {
        queue_key,
        drain_threshold: non_zero_u32(drain_threshold.into(), "views.drain_threshold")?,
        cold_start_delay_secs: non_zero_u64(
            views
                .cold_start_delay_secs
                .unwrap_or(DEFAULT_VIEWS_COLD_START_DELAY_SECS),
            "views.cold_start_delay_secs",
        )?,
        batch_size: non_zero_u32(batch_size.into(), "views.batch_size")?,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let drain = jobs
        .drain_concurrency
        .unwrap_or(DEFAULT_JOB_DRAIN_CONCURRENCY);

    let trending_cron =
        non_blank(jobs.trending_cron).unwrap_or_else(|| DEFAULT_REFRESH_TRENDING_CRON.to_string());
    refresh_trending_schedule(&trending_cron)
        .map_err(|reason| LoadError::invalid("jobs.trending_cron", reason))?;

    let lease_secs = non_zero_u64(
        jobs.trending_lease_secs
            .unwrap_or(DEFAULT_TRENDING_LEASE_SECS),
        "jobs.trending_lease_secs",
    )?;

    Ok(JobsSettings {
        drain_concurrency: non_zero_u32(drain.into(), "jobs.drain_concurrency")?,
        trending_cron,
        trending_lease: Duration::from_secs(lease_secs.get()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGraphSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
    connect_timeout_ms: Option<u64>,
    retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    key_prefix: Option<String>,
    tags_ttl_secs: Option<u64>,
    thread_tags_ttl_secs: Option<u64>,
    homepage_ttl_secs: Option<u64>,
    trending_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawViewsSettings {
    queue_key: Option<String>,
    drain_threshold: Option<u32>,
    cold_start_delay_secs: Option<u64>,
    batch_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    drain_concurrency: Option<u32>,
    trending_cron: Option<String>,
    trending_lease_secs: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
