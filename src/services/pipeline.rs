//! Dispatcher and worker pool: the execution side of the pipeline.
//!
//! One dispatcher task blocks on the broker and hands each decoded job to a
//! fixed pool of workers over a capacity-1 channel, so the broker is only
//! drained as fast as workers pick jobs up. A `watch` channel signals
//! cooperative shutdown; dropping the handoff sender drains the pool, and the
//! supervisor returns once every in-flight job has made its terminal write.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::db::JobStore;
use crate::models::job::{GeometryError, JobStatus, ResizeJob};
use crate::services::queue::{Broker, Delivery, JobQueue};
use crate::services::storage::{ObjectStore, StorageError};
use crate::services::strategy::ResizeAlgorithm;

/// How long a single blocking dequeue may wait before the dispatcher rechecks
/// the shutdown signal.
const DEQUEUE_TIMEOUT_SECS: f64 = 1.0;

/// Why one payload within a job produced no result.
#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Upload(#[from] StorageError),
}

/// Run the dispatcher plus a fixed pool of `worker_count` workers until the
/// shutdown signal flips and all claimed jobs have finished.
pub async fn run<S, O>(
    queue: Arc<JobQueue>,
    store: Arc<S>,
    storage: Arc<O>,
    worker_count: usize,
    shutdown: watch::Receiver<bool>,
) where
    S: JobStore + 'static,
    O: ObjectStore + 'static,
{
    let (handoff_tx, handoff_rx) = mpsc::channel::<Delivery>(1);

    let mut tasks = JoinSet::new();

    {
        let queue = queue.clone();
        tasks.spawn(dispatch(queue, handoff_tx, shutdown));
    }

    spawn_workers(&mut tasks, worker_count, handoff_rx, queue, store, storage);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "pipeline task panicked");
        }
    }

    info!("pipeline drained");
}

/// Consume broker messages and forward them into the worker handoff.
///
/// The send blocks until a worker is free; undequeued messages stay on the
/// durable queue. Exits when shutdown is signalled, which also closes the
/// handoff and lets the workers drain.
async fn dispatch(queue: Arc<JobQueue>, handoff: mpsc::Sender<Delivery>, mut shutdown: watch::Receiver<bool>) {
    info!("dispatcher started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("dispatcher stopping, no longer accepting broker messages");
                break;
            }
            dequeued = queue.dequeue(DEQUEUE_TIMEOUT_SECS) => match dequeued {
                Ok(Some(delivery)) => {
                    if let Ok(depth) = queue.queue_depth().await {
                        metrics::gauge!("resize_queue_depth").set(depth as f64);
                    }
                    debug!(job_id = %delivery.job.job_id, "handing job to worker pool");
                    if handoff.send(delivery).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "broker dequeue failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// Spawn `count` workers competing on one handoff receiver.
///
/// The receiver sits behind a mutex so exactly one worker claims any given
/// job; a worker runs its claim to completion before asking for the next.
pub fn spawn_workers<B, S, O>(
    tasks: &mut JoinSet<()>,
    count: usize,
    handoff: mpsc::Receiver<Delivery>,
    broker: Arc<B>,
    store: Arc<S>,
    storage: Arc<O>,
) where
    B: Broker + 'static,
    S: JobStore + 'static,
    O: ObjectStore + 'static,
{
    let handoff = Arc::new(Mutex::new(handoff));

    for worker_id in 0..count {
        let handoff = handoff.clone();
        let broker = broker.clone();
        let store = store.clone();
        let storage = storage.clone();

        tasks.spawn(async move {
            debug!(worker_id, "worker started");
            loop {
                let delivery = {
                    let mut rx = handoff.lock().await;
                    rx.recv().await
                };
                let Some(delivery) = delivery else {
                    debug!(worker_id, "handoff closed, worker exiting");
                    break;
                };
                process_delivery(broker.as_ref(), store.as_ref(), storage.as_ref(), delivery).await;
            }
        });
    }
}

/// Execute one claimed job to its terminal state.
///
/// Per-item failures leave their result slot empty and never abort the job.
/// The status becomes terminal in a single store write, and the broker message
/// is acknowledged only after that write succeeds; a crash or store failure
/// before then leaves the message for redelivery, which the idempotent upsert
/// absorbs.
pub async fn process_delivery<B, S, O>(broker: &B, store: &S, storage: &O, delivery: Delivery)
where
    B: Broker,
    S: JobStore,
    O: ObjectStore,
{
    let mut job = delivery.job.clone();
    let started = std::time::Instant::now();

    info!(
        job_id = %job.job_id,
        algorithm = %job.algorithm,
        images = job.images.len(),
        "processing resize job"
    );

    let algorithm = match ResizeAlgorithm::resolve(&job.algorithm) {
        Ok(a) => a,
        Err(e) => {
            warn!(job_id = %job.job_id, error = %e, "job failed before any item work");
            job.status = JobStatus::Failed;
            job.result_urls = vec![None; job.images.len()];
            metrics::counter!("resize_jobs_failed").increment(1);
            finish(broker, store, &job, &delivery).await;
            return;
        }
    };

    let mut results = vec![None; job.images.len()];
    for (index, encoded) in job.images.iter().enumerate() {
        match process_image(storage, &job, algorithm, index, encoded).await {
            Ok(url) => {
                debug!(job_id = %job.job_id, index, "image resized and uploaded");
                results[index] = Some(url);
            }
            Err(e) => {
                warn!(job_id = %job.job_id, index, error = %e, "image failed, leaving result slot empty");
            }
        }
    }

    let succeeded = results.iter().filter(|r| r.is_some()).count();
    job.result_urls = results;
    job.status = JobStatus::Completed;

    metrics::counter!("resize_jobs_completed").increment(1);
    metrics::histogram!("resize_job_seconds").record(started.elapsed().as_secs_f64());

    info!(
        job_id = %job.job_id,
        succeeded,
        total = job.images.len(),
        "resize job completed"
    );

    finish(broker, store, &job, &delivery).await;
}

/// Terminal write, then acknowledge. A failed write leaves the message
/// unacked so the broker redelivers it.
async fn finish<B, S>(broker: &B, store: &S, job: &ResizeJob, delivery: &Delivery)
where
    B: Broker,
    S: JobStore,
{
    if let Err(e) = store.save(job).await {
        error!(job_id = %job.job_id, error = %e, "terminal write failed, leaving message for redelivery");
        return;
    }

    if let Err(e) = broker.ack(delivery).await {
        warn!(job_id = %job.job_id, error = %e, "failed to acknowledge message, job may be reprocessed");
    }
}

/// Decode, resize, encode, and upload one payload, returning its location.
async fn process_image<O: ObjectStore>(
    storage: &O,
    job: &ResizeJob,
    algorithm: ResizeAlgorithm,
    index: usize,
    encoded: &str,
) -> Result<String, ItemError> {
    let bytes = BASE64.decode(encoded)?;
    let img = image::load_from_memory(&bytes)?;

    let (width, height) = job.target_dimensions(img.width(), img.height())?;
    let resized = algorithm.resize(&img, width, height);

    let mut out = Cursor::new(Vec::new());
    resized.to_rgb8().write_to(&mut out, image::ImageFormat::Jpeg)?;

    let key = format!("{}_{}.jpg", job.job_id, index + 1);
    let url = storage.upload(&key, out.get_ref(), "image/jpeg").await?;

    Ok(url)
}
