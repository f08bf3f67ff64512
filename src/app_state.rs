use sqlx::PgPool;
use std::sync::Arc;

use crate::db::PgJobStore;
use crate::services::queue::JobQueue;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: PgJobStore,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(db: PgPool, queue: JobQueue) -> Self {
        Self {
            store: PgJobStore::new(db.clone()),
            db,
            queue: Arc::new(queue),
        }
    }
}
