use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a resize job in the async pipeline.
///
/// Transitions are monotonic: `InProgress` until the worker's single terminal
/// write, then `Completed` or `Failed` forever.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

/// Target geometry of a resize job, interpreted from whichever addressing
/// mode the record populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetGeometry {
    /// Relative scale, in percent of the source dimensions (may exceed 100).
    Percent(u32),
    /// Absolute output dimensions in pixels.
    Absolute { width: u32, height: u32 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("no target geometry specified")]
    Missing,

    #[error("both resize_percent and absolute dimensions specified")]
    Ambiguous,

    #[error("absolute geometry requires both target_width and target_height")]
    Incomplete,
}

/// A resize job: the unit of work flowing through the pipeline.
///
/// This is also the broker wire format (JSON-serialized). The Job Store keeps
/// everything except the input payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResizeJob {
    pub job_id: Uuid,
    pub owner_id: String,
    /// Ordered base64-encoded input images.
    pub images: Vec<String>,
    pub algorithm: String,
    pub resize_percent: Option<u32>,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub status: JobStatus,
    /// Output locations, index-aligned with `images`. A failed item leaves
    /// `None` at its index rather than shifting the sequence.
    pub result_urls: Vec<Option<String>>,
    pub created_at: DateTime<Utc>,
}

impl ResizeJob {
    /// The geometry mode this job populates. Exactly one mode must be set.
    pub fn geometry(&self) -> Result<TargetGeometry, GeometryError> {
        match (self.resize_percent, self.target_width, self.target_height) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(GeometryError::Ambiguous),
            (Some(percent), None, None) => Ok(TargetGeometry::Percent(percent)),
            (None, Some(width), Some(height)) => Ok(TargetGeometry::Absolute { width, height }),
            (None, None, None) => Err(GeometryError::Missing),
            (None, _, _) => Err(GeometryError::Incomplete),
        }
    }

    /// Effective output dimensions for a source image of `width` x `height`.
    /// Scaled dimensions truncate and are clamped to at least one pixel.
    pub fn target_dimensions(&self, width: u32, height: u32) -> Result<(u32, u32), GeometryError> {
        match self.geometry()? {
            TargetGeometry::Percent(percent) => {
                let scale = f64::from(percent) / 100.0;
                let w = (f64::from(width) * scale) as u32;
                let h = (f64::from(height) * scale) as u32;
                Ok((w.max(1), h.max(1)))
            }
            TargetGeometry::Absolute { width, height } => Ok((width, height)),
        }
    }
}
