use chrono::Utc;
use uuid::Uuid;

use crate::db::{JobStore, StoreError};
use crate::models::job::{GeometryError, JobStatus, ResizeJob};
use crate::models::request::ResizeRequest;
use crate::services::queue::{Broker, QueueError};
use crate::services::strategy::{ResizeAlgorithm, UnknownAlgorithm};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("failed to persist job: {0}")]
    Store(#[from] StoreError),

    #[error("failed to publish job: {0}")]
    Publish(#[from] QueueError),
}

impl SubmitError {
    /// Whether the submission was rejected for caller error rather than
    /// infrastructure failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnknownAlgorithm(_) | Self::Geometry(_))
    }
}

/// Build and submit a resize job, returning its id without waiting for
/// processing.
///
/// The in-progress record is persisted before the publish so the id is
/// queryable the moment the caller has it. If the publish fails the record is
/// deleted again: the submission fails as a whole and leaves no partial state.
/// The producer never retries; that is the caller's decision.
pub async fn submit<B: Broker, S: JobStore>(
    broker: &B,
    store: &S,
    request: ResizeRequest,
    owner_id: &str,
) -> Result<Uuid, SubmitError> {
    ResizeAlgorithm::resolve(&request.algorithm)?;

    let job = ResizeJob {
        job_id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        result_urls: vec![None; request.images.len()],
        images: request.images,
        algorithm: request.algorithm,
        resize_percent: request.resize_percent,
        target_width: request.target_width,
        target_height: request.target_height,
        status: JobStatus::InProgress,
        created_at: Utc::now(),
    };

    // Rejects missing, ambiguous, or half-specified geometry up front.
    job.geometry()?;

    store.save(&job).await?;

    if let Err(e) = broker.publish(&job).await {
        tracing::error!(job_id = %job.job_id, error = %e, "publish failed, rolling back job record");
        if let Err(del) = store.delete(job.job_id).await {
            tracing::error!(job_id = %job.job_id, error = %del, "failed to roll back job record");
        }
        return Err(e.into());
    }

    metrics::counter!("resize_jobs_submitted").increment(1);
    tracing::info!(
        job_id = %job.job_id,
        owner_id = %job.owner_id,
        algorithm = %job.algorithm,
        images = job.images.len(),
        "resize job published"
    );

    Ok(job.job_id)
}
