use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::ResizeJob;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable status/result persistence for resize jobs.
///
/// The single source of truth for status queries; the pipeline never answers
/// them from in-memory state. `save` is an upsert keyed by job id so broker
/// redeliveries overwrite instead of duplicating.
pub trait JobStore: Send + Sync {
    fn save(&self, job: &ResizeJob) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    fn get(
        &self,
        job_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ResizeJob>, StoreError>> + Send;

    fn list_by_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ResizeJob>, StoreError>> + Send;

    fn delete(&self, job_id: Uuid) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobStore for PgJobStore {
    async fn save(&self, job: &ResizeJob) -> Result<(), StoreError> {
        queries::upsert_job(&self.pool, job).await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ResizeJob>, StoreError> {
        Ok(queries::get_job(&self.pool, job_id).await?)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ResizeJob>, StoreError> {
        Ok(queries::list_jobs_by_owner(&self.pool, owner_id).await?)
    }

    async fn delete(&self, job_id: Uuid) -> Result<(), StoreError> {
        queries::delete_job(&self.pool, job_id).await?;
        Ok(())
    }
}

pub mod queries;
