use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use resize_pipeline::{
    config::AppConfig,
    db::{self, PgJobStore},
    services::{pipeline, queue::JobQueue, storage::R2Client},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting resize worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let storage = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
        config.r2_url_expiry_secs,
    )
    .expect("Failed to initialize R2 client");

    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    // Refuse to start processing if the broker is unreachable
    queue
        .health_check()
        .await
        .expect("Job queue is unreachable, refusing to start");

    // Requeue anything a crashed consumer left behind before we start
    // claiming jobs ourselves
    let requeued = queue
        .recover_stalled()
        .await
        .expect("Failed to recover stalled jobs");
    if requeued > 0 {
        tracing::info!(requeued, "Requeued jobs left unacknowledged by a previous run");
    }

    let queue = Arc::new(queue);
    let store = Arc::new(PgJobStore::new(db_pool.clone()));
    let storage = Arc::new(storage);

    let worker_count = config.worker_pool_size();
    tracing::info!(worker_count, "Worker ready, starting pipeline");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = tokio::spawn(pipeline::run(
        queue,
        store,
        storage,
        worker_count,
        shutdown_rx,
    ));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining in-flight jobs");

    // Dispatcher stops consuming; workers finish their current job's
    // terminal write before the pipeline future resolves.
    let _ = shutdown_tx.send(true);
    if let Err(e) = pipeline.await {
        tracing::error!(error = %e, "pipeline task failed");
    }

    db_pool.close().await;
    tracing::info!("Cleanup completed, exiting");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}
