use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::sink::StorageSink;
use super::uri::ArtifactPath;
use crate::error::{AdapterError, Result};

/// StorageSink implementation for S3-compatible object storage
///
/// Paths are `<bucket>/<key>`; buckets are created on first write when missing.
#[derive(Clone)]
pub struct S3Sink {
    s3_client: Arc<S3Client>,
    known_buckets: Arc<Mutex<HashSet<String>>>,
}

impl S3Sink {
    /// Create a new S3Sink
    pub fn new(s3_client: Arc<S3Client>) -> Self {
        Self {
            s3_client,
            known_buckets: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn resolve(path: &str) -> Result<(String, String)> {
        match ArtifactPath::parse_object(path)? {
            ArtifactPath::Object { bucket, key } => Ok((bucket, key)),
            ArtifactPath::Local(_) => Err(AdapterError::UnsupportedPathScheme {
                path: path.to_string(),
                backend: "object-store",
            }),
        }
    }

    /// Log every bucket visible to the configured credentials
    pub async fn log_buckets(&self) -> Result<()> {
        let response = self
            .s3_client
            .list_buckets()
            .send()
            .await
            .map_err(|e| AdapterError::storage("list buckets at", "/", e))?;

        for bucket in response.buckets() {
            info!(
                " - Bucket: {}, created {:?}",
                bucket.name().unwrap_or("<unnamed>"),
                bucket.creation_date()
            );
        }

        Ok(())
    }

    /// Make sure `bucket` exists, creating it when the backend reports it missing
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let mut known = self.known_buckets.lock().await;
        if known.contains(bucket) {
            return Ok(());
        }

        match self.s3_client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {}
            Err(e)
                if e.as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false) =>
            {
                info!("Creating bucket {}", bucket);
                self.s3_client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| AdapterError::storage("create bucket", bucket, e))?;
            }
            Err(e) => return Err(AdapterError::storage("check bucket", bucket, e)),
        }

        known.insert(bucket.to_string());
        Ok(())
    }
}

#[async_trait]
impl StorageSink for S3Sink {
    fn backend(&self) -> &'static str {
        "object-store"
    }

    async fn store(&self, path: &str, content: Bytes) -> Result<()> {
        let (bucket, key) = Self::resolve(path)?;
        self.ensure_bucket(&bucket).await?;

        let len = content.len();
        // PutObject replaces the object in one step, so readers never observe a partial write
        self.s3_client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .content_length(len as i64)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| AdapterError::storage("write", path, e))?;

        debug!("Wrote {} bytes to bucket={}, key={}", len, bucket, key);
        Ok(())
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>> {
        let (bucket, key) = Self::resolve(path)?;

        let response = self
            .s3_client
            .get_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| AdapterError::retrieval(path, e))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| AdapterError::retrieval(path, e))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_splits_bucket_and_key() {
        let (bucket, key) = S3Sink::resolve("results/run-1/out.esdl").unwrap();
        assert_eq!(bucket, "results");
        assert_eq!(key, "run-1/out.esdl");
    }

    #[test]
    fn test_resolve_rejects_local_paths() {
        let result = S3Sink::resolve("file:///tmp/out.esdl");
        assert!(matches!(
            result,
            Err(AdapterError::UnsupportedPathScheme { .. })
        ));
    }
}
