//! Worker-pool scenarios against in-memory fakes: the pool is fed through the
//! same handoff channel the dispatcher uses, so these cover claim, execution,
//! partial success, terminal writes, and acknowledge ordering without a
//! running broker.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use helpers::{
    delivery_for, garbage_payload, percent_job, png_payload, FakeBroker, MemoryJobStore,
    MemoryObjectStore,
};
use resize_pipeline::db::JobStore;
use resize_pipeline::models::job::JobStatus;
use resize_pipeline::services::pipeline::{process_delivery, spawn_workers};
use resize_pipeline::services::queue::Delivery;

async fn drain_pool(
    worker_count: usize,
    deliveries: Vec<Delivery>,
    broker: Arc<FakeBroker>,
    store: Arc<MemoryJobStore>,
    storage: Arc<MemoryObjectStore>,
) {
    let (tx, rx) = mpsc::channel(1);
    let mut tasks = JoinSet::new();
    spawn_workers(&mut tasks, worker_count, rx, broker, store, storage);

    for delivery in deliveries {
        tx.send(delivery).await.expect("worker pool alive");
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        joined.expect("worker task completed");
    }
}

#[tokio::test]
async fn three_payloads_complete_with_three_urls() {
    let broker = Arc::new(FakeBroker::default());
    let store = Arc::new(MemoryJobStore::default());
    let storage = Arc::new(MemoryObjectStore::new());

    let job = percent_job(
        vec![png_payload(8, 8), png_payload(10, 6), png_payload(12, 4)],
        "nearest",
        50,
    );

    drain_pool(
        2,
        vec![delivery_for(&job)],
        broker.clone(),
        store.clone(),
        storage.clone(),
    )
    .await;

    let stored = store.get(job.job_id).await.unwrap().expect("terminal record");
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.result_urls.len(), 3);
    for url in &stored.result_urls {
        let url = url.as_ref().expect("populated result slot");
        assert!(url.starts_with("memory://"), "unexpected location: {url}");
    }

    assert_eq!(storage.upload_count(), 3);
    assert_eq!(broker.acked(), vec![job.job_id]);
}

#[tokio::test]
async fn malformed_payload_leaves_its_slot_empty() {
    let broker = Arc::new(FakeBroker::default());
    let store = Arc::new(MemoryJobStore::default());
    let storage = Arc::new(MemoryObjectStore::new());

    let job = percent_job(vec![png_payload(8, 8), garbage_payload()], "bilinear", 50);

    drain_pool(
        1,
        vec![delivery_for(&job)],
        broker.clone(),
        store.clone(),
        storage.clone(),
    )
    .await;

    let stored = store.get(job.job_id).await.unwrap().expect("terminal record");
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.result_urls.len(), 2);
    assert!(stored.result_urls[0].is_some());
    assert!(stored.result_urls[1].is_none());

    // The job is still acknowledged: partial success is terminal.
    assert_eq!(broker.acked(), vec![job.job_id]);
}

#[tokio::test]
async fn unknown_algorithm_fails_without_touching_any_payload() {
    let broker = Arc::new(FakeBroker::default());
    let store = Arc::new(MemoryJobStore::default());
    let storage = Arc::new(MemoryObjectStore::new());

    let job = percent_job(vec![png_payload(8, 8), png_payload(8, 8)], "hexagonal", 50);

    drain_pool(
        1,
        vec![delivery_for(&job)],
        broker.clone(),
        store.clone(),
        storage.clone(),
    )
    .await;

    let stored = store.get(job.job_id).await.unwrap().expect("terminal record");
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.result_urls.iter().all(Option::is_none));
    assert_eq!(storage.upload_count(), 0);

    // Failed is terminal too, so the message is acknowledged.
    assert_eq!(broker.acked(), vec![job.job_id]);
}

#[tokio::test]
async fn pool_drains_all_jobs_with_bounded_concurrency() {
    const JOBS: usize = 8;
    const WORKERS: usize = 2;

    let broker = Arc::new(FakeBroker::default());
    let store = Arc::new(MemoryJobStore::default());
    let storage = Arc::new(MemoryObjectStore::with_delay(Duration::from_millis(25)));

    let jobs: Vec<_> = (0..JOBS)
        .map(|_| percent_job(vec![png_payload(8, 8)], "nearest", 50))
        .collect();
    let deliveries = jobs.iter().map(delivery_for).collect();

    drain_pool(
        WORKERS,
        deliveries,
        broker.clone(),
        store.clone(),
        storage.clone(),
    )
    .await;

    for job in &jobs {
        assert_eq!(store.status_of(job.job_id), Some(JobStatus::Completed));
    }
    assert_eq!(broker.acked().len(), JOBS);
    assert!(
        storage.max_in_flight() <= WORKERS,
        "observed {} concurrent uploads with {} workers",
        storage.max_in_flight(),
        WORKERS
    );
}

#[tokio::test]
async fn redelivered_message_overwrites_instead_of_duplicating() {
    let broker = FakeBroker::default();
    let store = MemoryJobStore::default();
    let storage = MemoryObjectStore::new();

    let job = percent_job(vec![png_payload(8, 8)], "nearest", 50);
    let delivery = delivery_for(&job);

    process_delivery(&broker, &store, &storage, delivery.clone()).await;
    process_delivery(&broker, &store, &storage, delivery).await;

    assert_eq!(store.len(), 1);
    assert_eq!(store.status_of(job.job_id), Some(JobStatus::Completed));
    assert_eq!(broker.acked(), vec![job.job_id, job.job_id]);
}

#[tokio::test]
async fn absolute_geometry_jobs_are_processed() {
    let broker = FakeBroker::default();
    let store = MemoryJobStore::default();
    let storage = MemoryObjectStore::new();

    let mut job = percent_job(vec![png_payload(16, 16)], "bicubic", 50);
    job.resize_percent = None;
    job.target_width = Some(4);
    job.target_height = Some(4);

    process_delivery(&broker, &store, &storage, delivery_for(&job)).await;

    let stored = store.get(job.job_id).await.unwrap().expect("terminal record");
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.result_urls[0].is_some());
}
