use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::JobStore;
use crate::models::request::{
    ErrorResponse, JobResponse, JobStatusResponse, ResizeRequest, ResizeResponse,
};
use crate::services::producer;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// The submitting principal, as set by the upstream auth layer.
fn owner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Missing x-user-id header"))
}

/// POST /api/v1/resize — Submit a batch of images for asynchronous resizing.
///
/// Returns 202 with the job id immediately; processing happens in the worker
/// pool. Validation errors are surfaced synchronously and create no job.
pub async fn submit_resize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ResizeRequest>,
) -> Result<(StatusCode, Json<ResizeResponse>), ApiError> {
    let owner = owner_id(&headers)?;

    if let Err(report) = request.validate() {
        return Err(api_error(StatusCode::BAD_REQUEST, report.to_string()));
    }

    match producer::submit(state.queue.as_ref(), &state.store, request, &owner).await {
        Ok(job_id) => Ok((
            StatusCode::ACCEPTED,
            Json(ResizeResponse {
                job_id,
                status: "accepted".to_string(),
            }),
        )),
        Err(e) if e.is_validation() => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, "failed to submit resize job");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to publish job",
            ))
        }
    }
}

/// GET /api/v1/resize/{job_id}/status — Lightweight status probe.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = fetch_job(&state, job_id).await?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        status: job.status.to_string(),
    }))
}

/// GET /api/v1/resize/{job_id} — Full job record including result locations.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = fetch_job(&state, job_id).await?;
    Ok(Json(JobResponse::from(&job)))
}

/// GET /api/v1/resize — All jobs submitted by the caller.
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    let owner = owner_id(&headers)?;

    let jobs = state.store.list_by_owner(&owner).await.map_err(|e| {
        tracing::error!(error = %e, "failed to list jobs");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list jobs")
    })?;

    Ok(Json(jobs.iter().map(JobResponse::from).collect()))
}

async fn fetch_job(state: &AppState, job_id: Uuid) -> Result<crate::models::job::ResizeJob, ApiError> {
    state
        .store
        .get(job_id)
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "failed to load job");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load job")
        })?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Job not found"))
}
