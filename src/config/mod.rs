use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job queue
    pub redis_url: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// Expiry of presigned result URLs, in seconds (max 7 days)
    #[serde(default = "default_url_expiry_secs")]
    pub r2_url_expiry_secs: u32,

    /// Worker pool size; defaults to the host's available parallelism
    pub worker_count: Option<usize>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_url_expiry_secs() -> u32 {
    // S3 rejects presign durations above 7 days.
    604_800
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}
