use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Upload seam of the object store, so the worker pool can run against an
/// in-memory store in tests. Returns the public location of the object.
pub trait ObjectStore: Send + Sync {
    fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<String, StorageError>> + Send;
}

/// Client for Cloudflare R2 object storage (S3-compatible).
pub struct R2Client {
    bucket: Box<Bucket>,
    url_expiry_secs: u32,
}

impl R2Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        url_expiry_secs: u32,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            bucket,
            url_expiry_secs,
        })
    }
}

impl ObjectStore for R2Client {
    /// Upload result bytes and return a presigned GET URL for them.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;

        let url = self
            .bucket
            .presign_get(key, self.url_expiry_secs, None)
            .await
            .map_err(StorageError::S3)?;

        Ok(url)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}
