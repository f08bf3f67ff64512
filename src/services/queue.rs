use redis::AsyncCommands;

use crate::models::job::ResizeJob;

const QUEUE_KEY: &str = "resize:jobs";
const PROCESSING_KEY: &str = "resize:processing";

/// A message claimed from the broker.
///
/// Carries the raw payload alongside the decoded job so the acknowledge can
/// remove the exact stored message after the terminal persistence write.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: ResizeJob,
    pub payload: String,
}

/// Publish/acknowledge seam of the broker, so the producer and worker pool can
/// run against a fake broker in tests.
pub trait Broker: Send + Sync {
    fn publish(&self, job: &ResizeJob) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;

    /// Acknowledge a delivery after its terminal state has been persisted.
    fn ack(&self, delivery: &Delivery) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;
}

/// Redis-backed durable job queue with competing consumers.
///
/// Messages are JSON-serialized jobs on a named list. Dequeue atomically moves
/// a message into a processing list; acknowledging removes it from there. A
/// consumer that dies mid-job leaves its message parked in the processing
/// list, so workers call [`JobQueue::recover_stalled`] at startup to move
/// those entries back onto the queue for redelivery.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Claim the next job, blocking up to `timeout_secs`.
    ///
    /// Returns `None` when the wait times out with the queue empty. A message
    /// that fails to decode is dropped from the processing list and skipped;
    /// it can never be executed, so holding it would only block redelivery.
    pub async fn dequeue(&self, timeout_secs: f64) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let payload: Option<String> = conn
            .blmove(
                QUEUE_KEY,
                PROCESSING_KEY,
                redis::Direction::Right,
                redis::Direction::Left,
                timeout_secs,
            )
            .await
            .map_err(QueueError::Redis)?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<ResizeJob>(&payload) {
            Ok(job) => Ok(Some(Delivery { job, payload })),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable message from queue");
                conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
                    .await
                    .map_err(QueueError::Redis)?;
                Ok(None)
            }
        }
    }

    /// Move messages parked in the processing list back onto the queue,
    /// returning how many were requeued.
    ///
    /// Entries there belong to consumers that died between claiming a job and
    /// acknowledging it. Run this before a worker process starts consuming:
    /// jobs that other live consumers still hold get re-executed, which the
    /// idempotent terminal upsert absorbs.
    pub async fn recover_stalled(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let mut requeued = 0u64;
        loop {
            let moved: Option<String> = conn
                .lmove(
                    PROCESSING_KEY,
                    QUEUE_KEY,
                    redis::Direction::Right,
                    redis::Direction::Left,
                )
                .await
                .map_err(QueueError::Redis)?;

            if moved.is_none() {
                return Ok(requeued);
            }
            requeued += 1;
        }
    }

    /// Check Redis connectivity (for health checks and startup).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Number of jobs waiting on the queue.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

impl Broker for JobQueue {
    async fn publish(&self, job: &ResizeJob) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &delivery.payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
