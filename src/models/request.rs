use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::ResizeJob;

/// Request to submit a batch of images for resizing.
///
/// Exactly one geometry mode must be populated: `resize_percent`, or
/// `target_width` together with `target_height`. That cross-field rule is
/// enforced by the producer; garde covers the per-field ranges.
#[derive(Debug, Deserialize, Validate)]
pub struct ResizeRequest {
    /// Base64-encoded input images.
    #[garde(length(min = 1, max = 20))]
    pub images: Vec<String>,

    #[garde(length(min = 1, max = 32))]
    pub algorithm: String,

    /// Relative scale in percent. Values above 100 upscale.
    #[garde(range(min = 1, max = 1000))]
    pub resize_percent: Option<u32>,

    #[garde(range(min = 1, max = 10_000))]
    pub target_width: Option<u32>,

    #[garde(range(min = 1, max = 10_000))]
    pub target_height: Option<u32>,
}

/// Response after accepting a resize submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResizeResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Response for querying job status.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Full job view returned by the by-id and by-owner queries.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: String,
    pub algorithm: String,
    pub result_urls: Vec<Option<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ResizeJob> for JobResponse {
    fn from(job: &ResizeJob) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status.to_string(),
            algorithm: job.algorithm.clone(),
            result_urls: job.result_urls.clone(),
            created_at: job.created_at,
        }
    }
}

/// Error body returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
