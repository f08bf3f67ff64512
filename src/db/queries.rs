use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::job::{JobStatus, ResizeJob};

/// Upsert a job keyed by its id. Replays and retries overwrite status and
/// results, never duplicate rows. Input payloads are not persisted.
pub async fn upsert_job(pool: &PgPool, job: &ResizeJob) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO resize_jobs
            (job_id, owner_id, algorithm, resize_percent, target_width, target_height,
             status, result_urls, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (job_id) DO UPDATE
        SET status = EXCLUDED.status,
            result_urls = EXCLUDED.result_urls,
            updated_at = NOW()
        "#,
    )
    .bind(job.job_id)
    .bind(&job.owner_id)
    .bind(&job.algorithm)
    .bind(job.resize_percent.map(|p| p as i32))
    .bind(job.target_width.map(|w| w as i32))
    .bind(job.target_height.map(|h| h as i32))
    .bind(job.status.to_string())
    .bind(Json(&job.result_urls))
    .bind(job.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a job by id. The `images` field comes back empty: payloads live on the
/// queue message only.
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<ResizeJob>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT job_id, owner_id, algorithm, resize_percent, target_width, target_height,
               status, result_urls, created_at
        FROM resize_jobs
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.map(job_from_row).transpose()
}

/// All jobs submitted by one owner, oldest first.
pub async fn list_jobs_by_owner(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Vec<ResizeJob>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, owner_id, algorithm, resize_percent, target_width, target_height,
               status, result_urls, created_at
        FROM resize_jobs
        WHERE owner_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(job_from_row).collect()
}

/// Remove a job record (producer compensation when publish fails).
pub async fn delete_job(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM resize_jobs WHERE job_id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Map a stored status string back to the enum. An unrecognized value means
/// the row was corrupted outside the application; it is flagged loudly and
/// read as non-terminal rather than invented as completed.
fn parse_status(job_id: Uuid, status_str: &str) -> JobStatus {
    JobStatus::from_str(status_str).unwrap_or_else(|_| {
        tracing::warn!(
            job_id = %job_id,
            status = %status_str,
            "unrecognized stored job status, treating as in_progress"
        );
        JobStatus::InProgress
    })
}

fn job_from_row(row: sqlx::postgres::PgRow) -> Result<ResizeJob, sqlx::Error> {
    let job_id: Uuid = row.try_get("job_id")?;
    let status_str: String = row.try_get("status")?;
    let status = parse_status(job_id, &status_str);
    let result_urls: Json<Vec<Option<String>>> = row.try_get("result_urls")?;

    Ok(ResizeJob {
        job_id,
        owner_id: row.try_get("owner_id")?,
        images: Vec::new(),
        algorithm: row.try_get("algorithm")?,
        resize_percent: row.try_get::<Option<i32>, _>("resize_percent")?.map(|p| p as u32),
        target_width: row.try_get::<Option<i32>, _>("target_width")?.map(|w| w as u32),
        target_height: row.try_get::<Option<i32>, _>("target_height")?.map(|h| h as u32),
        status,
        result_urls: result_urls.0,
        created_at: row.try_get("created_at")?,
    })
}
