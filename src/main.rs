use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use videoflix_backend::app;
use videoflix_backend::config::settings::{AppConfig, GuardBackend, SourceBackend};
use videoflix_backend::infrastructure::db::pool;
use videoflix_backend::infrastructure::queue::rabbitmq::RabbitMqService;
use videoflix_backend::infrastructure::redis::client::RedisService;
use videoflix_backend::infrastructure::storage::s3::StorageService;
use videoflix_backend::modules::progress::repository::{ProgressRepository, ProgressStore};
use videoflix_backend::modules::video::repository::{VideoRepository, VideoStore};
use videoflix_backend::state::AppState;
use videoflix_backend::transcode::encoder::FfmpegEncoder;
use videoflix_backend::transcode::guard::{JobGuard, LocalJobGuard, RedisJobGuard};
use videoflix_backend::transcode::publish::HlsLayout;
use videoflix_backend::transcode::source::{LocalSourceStore, S3SourceStore, SourceStore};
use videoflix_backend::transcode::{JobQueue, LocalJobQueue, TranscodeDispatcher, TranscodeWorker};
use videoflix_backend::workers::pool::{job_channel, WorkerPool};
use videoflix_backend::workers::reconciler::{start_reconciler, StaleRunReconciler};
use videoflix_backend::workers::transcoder::start_transcoder_consumer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("Invalid configuration")?;
    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("Cannot create media root {}", config.media_root.display()))?;

    let db = pool::connect_to_db(&config.database_url).await?;
    pool::run_migrations(&db).await?;

    let videos: Arc<dyn VideoStore> = Arc::new(VideoRepository::new(db.clone()));
    let progress: Arc<dyn ProgressStore> = Arc::new(ProgressRepository::new(db));

    let guard: Arc<dyn JobGuard> = match config.transcode.guard_backend {
        GuardBackend::Memory => Arc::new(LocalJobGuard::new()),
        GuardBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("JOB_GUARD_BACKEND=redis requires REDIS_URL")?;
            let redis = RedisService::new(url).await?;
            Arc::new(RedisJobGuard::new(redis, config.transcode.guard_ttl))
        }
    };

    let storage = config.minio.as_ref().map(StorageService::new);
    let sources: Arc<dyn SourceStore> = match (config.source_backend, storage.clone()) {
        (SourceBackend::S3, Some(storage)) => Arc::new(S3SourceStore::new(storage)),
        (SourceBackend::S3, None) => anyhow::bail!("SOURCE_BACKEND=s3 requires MinIO settings"),
        (SourceBackend::Local, _) => Arc::new(LocalSourceStore::new(config.media_root.clone())),
    };

    let worker = Arc::new(TranscodeWorker::new(
        videos.clone(),
        sources,
        Arc::new(FfmpegEncoder::new(
            config.transcode.ffmpeg_bin.clone(),
            config.transcode.segment_seconds,
        )),
        HlsLayout::new(config.media_root.clone()),
        config.transcode.encoder_timeout,
    ));

    let (pool_tx, pool_rx) = job_channel();
    let workers = WorkerPool::spawn(config.transcode.workers, pool_rx, worker, guard.clone());
    info!("Transcode pool ready with {} workers", workers.size());

    let queue: Arc<dyn JobQueue> = match config.rabbitmq_url.as_deref() {
        Some(url) => {
            let rabbit = RabbitMqService::new(url).await?;
            let consumer = rabbit.clone();
            let tx = pool_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = start_transcoder_consumer(consumer, tx).await {
                    error!("Transcoder consumer stopped: {}", e);
                }
            });
            Arc::new(rabbit)
        }
        None => {
            warn!("RABBITMQ_URL not set, using the in-process job queue");
            Arc::new(LocalJobQueue::new(pool_tx.clone()))
        }
    };

    let reconciler = StaleRunReconciler::new(videos.clone(), guard.clone(), config.transcode.stale_after);
    let schedule = config.transcode.reconcile_cron.clone();
    tokio::spawn(async move {
        if let Err(e) = start_reconciler(reconciler, schedule).await {
            error!("Reconciler stopped: {}", e);
        }
    });

    let dispatcher = TranscodeDispatcher::new(guard, queue, videos.clone());
    let state = AppState::new(config.clone(), videos, progress, dispatcher, storage);
    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
