//! In-memory fakes for the pipeline's broker/store/storage seams, plus
//! payload builders.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use uuid::Uuid;

use resize_pipeline::db::{JobStore, StoreError};
use resize_pipeline::models::job::{JobStatus, ResizeJob};
use resize_pipeline::services::queue::{Broker, Delivery, QueueError};
use resize_pipeline::services::storage::{ObjectStore, StorageError};

/// Job store backed by a hash map. Mirrors the upsert semantics of the
/// Postgres store: saving a known id overwrites in place.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, ResizeJob>>,
}

impl MemoryJobStore {
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn status_of(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.lock().unwrap().get(&job_id).map(|j| j.status)
    }
}

impl JobStore for MemoryJobStore {
    async fn save(&self, job: &ResizeJob) -> Result<(), StoreError> {
        self.jobs.lock().unwrap().insert(job.job_id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ResizeJob>, StoreError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ResizeJob>, StoreError> {
        let mut jobs: Vec<ResizeJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn delete(&self, job_id: Uuid) -> Result<(), StoreError> {
        self.jobs.lock().unwrap().remove(&job_id);
        Ok(())
    }
}

/// Object store that keeps uploads in memory and tracks how many uploads are
/// in flight at once, to observe worker-pool concurrency.
pub struct MemoryObjectStore {
    uploads: Mutex<HashMap<String, Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    upload_delay: Duration,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(upload_delay: Duration) -> Self {
        Self {
            uploads: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            upload_delay,
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, data: &[u8], _content_type: &str) -> Result<String, StorageError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }

        self.uploads
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(format!("memory://bucket/{key}"))
    }
}

/// Broker fake recording publishes and acknowledgements, with a switch to
/// simulate an unreachable broker.
#[derive(Default)]
pub struct FakeBroker {
    published: Mutex<Vec<ResizeJob>>,
    acked: Mutex<Vec<Uuid>>,
    fail_publish: AtomicBool,
}

impl FakeBroker {
    pub fn failing() -> Self {
        let broker = Self::default();
        broker.fail_publish.store(true, Ordering::SeqCst);
        broker
    }

    pub fn published(&self) -> Vec<ResizeJob> {
        self.published.lock().unwrap().clone()
    }

    pub fn acked(&self) -> Vec<Uuid> {
        self.acked.lock().unwrap().clone()
    }
}

impl Broker for FakeBroker {
    async fn publish(&self, job: &ResizeJob) -> Result<(), QueueError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(QueueError::Serialize(serde::de::Error::custom(
                "broker unreachable",
            )));
        }
        self.published.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.acked.lock().unwrap().push(delivery.job.job_id);
        Ok(())
    }
}

/// A small valid PNG, base64-encoded the way the submission boundary carries
/// payloads.
pub fn png_payload(width: u32, height: u32) -> String {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode test image");
    BASE64.encode(buf.get_ref())
}

/// Base64 that decodes fine but is not an image.
pub fn garbage_payload() -> String {
    BASE64.encode(b"definitely not pixels")
}

pub fn percent_job(images: Vec<String>, algorithm: &str, percent: u32) -> ResizeJob {
    ResizeJob {
        job_id: Uuid::new_v4(),
        owner_id: "owner-1".to_string(),
        result_urls: vec![None; images.len()],
        images,
        algorithm: algorithm.to_string(),
        resize_percent: Some(percent),
        target_width: None,
        target_height: None,
        status: JobStatus::InProgress,
        created_at: Utc::now(),
    }
}

pub fn delivery_for(job: &ResizeJob) -> Delivery {
    Delivery {
        payload: serde_json::to_string(job).expect("serialize job"),
        job: job.clone(),
    }
}
