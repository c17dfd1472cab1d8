use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the agora binary.
#[derive(Debug, Parser)]
#[command(name = "agora", version, about = "Forum trending and recommendation services")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "AGORA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API together with the background job workers.
    Serve(Box<ServeArgs>),
    /// Rebuild the trending snapshot now.
    #[command(name = "refresh-trending")]
    RefreshTrending(MaintenanceArgs),
    /// Move every buffered view into the event store now.
    #[command(name = "drain-views")]
    DrainViews(MaintenanceArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Store locations, shared by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the graph store connection URL.
    #[arg(long = "graph-url", value_name = "URL")]
    pub graph_url: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MaintenanceArgs {
    #[command(flatten)]
    pub stores: StoreOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub stores: StoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the namespace prepended to cache keys.
    #[arg(long = "cache-key-prefix", value_name = "PREFIX")]
    pub cache_key_prefix: Option<String>,

    /// Override the queue length that triggers an immediate drain.
    #[arg(long = "views-drain-threshold", value_name = "COUNT")]
    pub views_drain_threshold: Option<u32>,

    /// Override the maximum number of views moved per drain.
    #[arg(long = "views-batch-size", value_name = "COUNT")]
    pub views_batch_size: Option<u32>,

    /// Override the drain-views worker concurrency.
    #[arg(long = "jobs-drain-concurrency", value_name = "COUNT")]
    pub jobs_drain_concurrency: Option<u32>,

    /// Override the trending refresh cron expression.
    #[arg(long = "jobs-trending-cron", value_name = "CRON")]
    pub jobs_trending_cron: Option<String>,
}
