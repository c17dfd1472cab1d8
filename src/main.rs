use std::{process, sync::Arc};

use agora::{
    application::{
        aggregator::ViewAggregator,
        error::AppError,
        forum::ForumService,
        jobs::{
            DrainViewsJobPayload, JobWorkerContext, RefreshTrendingJobPayload,
            process_drain_views_job, process_refresh_trending_job, process_refresh_trending_tick,
            refresh_trending_schedule,
        },
        repos::{GraphRepo, JobsRepo},
        similarity::SimilarityService,
        tags::TagService,
        trending::{RefreshOutcome, TrendingConfig, TrendingService},
        views::{ViewBuffer, ViewQueueConfig},
    },
    cache::{CacheAside, CacheConfig, KvStore, MemoryStore},
    config,
    domain::types::JobType,
    infra::{
        db::{PostgresGraph, PostgresRepositories},
        error::InfraError,
        http::{self, ApiState},
        redis::RedisStore,
        telemetry,
    },
};
use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::RefreshTrending(_) => run_refresh_trending(settings).await,
        config::Command::DrainViews(_) => run_drain_views(settings).await,
    }
}

/// Handles shared by the request path and the job workers. Each side gets
/// its own pool.
struct Stores {
    http: Arc<PostgresRepositories>,
    jobs: Arc<PostgresRepositories>,
    graph: Arc<PostgresGraph>,
    kv: Arc<dyn KvStore>,
    kv_is_local: bool,
}

struct ApplicationContext {
    api_state: ApiState,
    job_context: JobWorkerContext,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;

    PostgresStorage::setup(stores.jobs.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let app = build_application_context(&stores, &settings);

    let monitor_handle = spawn_job_monitor(stores.jobs.clone(), app.job_context.clone(), &settings)?;

    let result = serve_http(&settings, app.api_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    // A process-local buffer dies with the process; flush it first.
    if stores.kv_is_local {
        flush_local_buffer(&app.job_context, &settings).await;
    }

    result
}

async fn run_refresh_trending(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;
    let app = build_application_context(&stores, &settings);

    match app.job_context.trending.refresh().await? {
        RefreshOutcome::Refreshed => info!(target = "agora::refresh_trending", "trending refreshed"),
        RefreshOutcome::Skipped => warn!(
            target = "agora::refresh_trending",
            "another refresh holds the lease; nothing done"
        ),
    }
    Ok(())
}

async fn run_drain_views(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;
    let app = build_application_context(&stores, &settings);

    let written = app.job_context.aggregator.drain_all().await?;
    info!(target = "agora::drain_views", written, "view buffer drained");
    Ok(())
}

async fn init_stores(settings: &config::Settings) -> Result<Stores, AppError> {
    let (http, jobs) = init_repositories(settings).await?;
    let graph = init_graph(settings, &http).await?;

    let (kv, kv_is_local): (Arc<dyn KvStore>, bool) = match settings.redis.url.as_deref() {
        Some(url) => (
            Arc::new(RedisStore::connect(url, &settings.redis).await?),
            false,
        ),
        None => {
            warn!(
                target = "agora::startup",
                "redis url is not configured; cache and view buffer are process-local"
            );
            (Arc::new(MemoryStore::new()), true)
        }
    };

    Ok(Stores {
        http,
        jobs,
        graph,
        kv,
        kv_is_local,
    })
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

async fn init_graph(
    settings: &config::Settings,
    http: &PostgresRepositories,
) -> Result<Arc<PostgresGraph>, AppError> {
    let pool = match settings.graph.url.as_deref() {
        Some(url) => PostgresRepositories::connect(url, settings.graph.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?,
        None => http.pool().clone(),
    };

    PostgresGraph::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresGraph::new(pool)))
}

fn build_application_context(stores: &Stores, settings: &config::Settings) -> ApplicationContext {
    let cache_config = CacheConfig::from(&settings.cache);
    let queue_config = ViewQueueConfig::from(&settings.views);
    let cache = CacheAside::new(stores.kv.clone(), cache_config.key_prefix.clone());
    let trending_config = TrendingConfig {
        cache_ttl: cache_config.trending_ttl(),
        lease_ttl: settings.jobs.trending_lease,
        key_prefix: cache_config.key_prefix.clone(),
    };
    let graph: Arc<dyn GraphRepo> = stores.graph.clone();
    let jobs_repo: Arc<dyn JobsRepo> = stores.http.clone();

    let views = Arc::new(ViewBuffer::new(
        stores.kv.clone(),
        jobs_repo.clone(),
        queue_config.clone(),
    ));
    let trending = Arc::new(TrendingService::new(
        stores.http.clone(),
        cache.clone(),
        trending_config.clone(),
    ));
    let similarity = Arc::new(SimilarityService::new(stores.http.clone(), graph.clone()));
    let tags = Arc::new(TagService::new(
        stores.http.clone(),
        stores.http.clone(),
        stores.http.clone(),
        graph.clone(),
        cache.clone(),
        cache_config.clone(),
    ));
    let forum = Arc::new(ForumService::new(
        stores.http.clone(),
        graph,
        cache.clone(),
        cache_config,
    ));

    // Workers talk to the stores through the jobs pool only.
    let job_context = JobWorkerContext {
        aggregator: Arc::new(ViewAggregator::new(
            stores.kv.clone(),
            stores.jobs.clone(),
            queue_config,
        )),
        trending: Arc::new(TrendingService::new(
            stores.jobs.clone(),
            cache,
            trending_config,
        )),
    };

    ApplicationContext {
        api_state: ApiState {
            views,
            trending,
            similarity,
            tags,
            forum,
            jobs: jobs_repo,
            db: Some(stores.http.clone()),
        },
        job_context,
    }
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: JobWorkerContext,
    settings: &config::Settings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let drain_storage: PostgresStorage<DrainViewsJobPayload> = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::DrainViews.as_str()),
    );
    let refresh_storage: PostgresStorage<RefreshTrendingJobPayload> =
        PostgresStorage::new_with_config(
            repositories.pool().clone(),
            ApalisSqlConfig::new(JobType::RefreshTrending.as_str()),
        );
    let schedule = refresh_trending_schedule(&settings.jobs.trending_cron)
        .map_err(|reason| AppError::from(InfraError::configuration(reason)))?;

    let drain_worker = WorkerBuilder::new("drain-views-worker")
        .concurrency(settings.jobs.drain_concurrency.get() as usize)
        .data(context.clone())
        .backend(drain_storage)
        .build_fn(process_drain_views_job);
    // Refreshes are serialized by the lease; one worker is enough.
    let refresh_worker = WorkerBuilder::new("refresh-trending-worker")
        .concurrency(1)
        .data(context.clone())
        .backend(refresh_storage)
        .build_fn(process_refresh_trending_job);
    let refresh_cron_worker = WorkerBuilder::new("refresh-trending-cron")
        .data(context)
        .backend(CronStream::new(schedule))
        .build_fn(process_refresh_trending_tick);

    let monitor = Monitor::new()
        .register(drain_worker)
        .register(refresh_worker)
        .register(refresh_cron_worker);

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, api_state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(api_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "agora::serve", addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(target = "agora::serve", "shutdown signal received");
}

async fn flush_local_buffer(context: &JobWorkerContext, settings: &config::Settings) {
    let deadline = settings.server.graceful_shutdown;
    match tokio::time::timeout(deadline, context.aggregator.drain_all()).await {
        Ok(Ok(written)) => info!(target = "agora::serve", written, "view buffer flushed"),
        Ok(Err(err)) => error!(error = %err, "failed to flush view buffer"),
        Err(_) => warn!(
            target = "agora::serve",
            timeout_secs = deadline.as_secs(),
            "view buffer flush timed out"
        ),
    }
}
