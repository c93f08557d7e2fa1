//! S3-compatible blob store implementation

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region as AwsRegion;

use super::{join_public_url, BlobStore, Overwrite, S3Config};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    config: S3Config,
}

impl S3BlobStore {
    pub async fn new(config: S3Config) -> Result<Self> {
        // Validate required fields
        if config.bucket_name.is_empty() {
            return Err(anyhow!("Bucket name is required"));
        }
        if config.access_key_id.is_empty() != config.secret_access_key.is_empty() {
            return Err(anyhow!(
                "Access key ID and secret access key must be provided together"
            ));
        }

        let region = if config.region.is_empty() {
            "us-east-1".to_string()
        } else {
            config.region.clone()
        };

        let mut s3_config_builder = if config.access_key_id.is_empty() {
            // No static keys: defer to the standard AWS credential chain
            let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(AwsRegion::new(region.clone()))
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&shared)
        } else {
            let credentials = Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session token
                None, // expiry
                "propdocs-blob-store",
            );
            aws_sdk_s3::config::Builder::new()
                .region(AwsRegion::new(region))
                .credentials_provider(credentials)
                .behavior_version_latest()
        };

        // Set custom endpoint if provided (for S3-compatible services)
        if let Some(endpoint_url) = &config.endpoint_url {
            if !endpoint_url.is_empty() {
                s3_config_builder = s3_config_builder
                    .endpoint_url(endpoint_url)
                    .force_path_style(true);
                info!("Using custom S3 endpoint: {}", endpoint_url);
            }
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self { client, config })
    }

    /// Test S3 connection and access to bucket
    pub async fn test_connection(&self) -> Result<()> {
        info!("Testing S3 connection to bucket: {}", self.config.bucket_name);

        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| anyhow!("Cannot access bucket {}: {}", self.config.bucket_name, e))?;

        Ok(())
    }

    /// Retry wrapper for S3 operations with exponential backoff
    async fn retry_operation<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("S3 operation '{}' succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(e) if attempt < MAX_RETRIES && is_retryable(&e) => {
                    let delay_ms = BASE_DELAY_MS * 2u64.pow(attempt);
                    warn!(
                        "S3 operation '{}' failed (attempt {}/{}), retrying in {}ms: {}",
                        operation_name,
                        attempt + 1,
                        MAX_RETRIES + 1,
                        delay_ms,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("S3 operation '{}' failed after {} attempts: {}", operation_name, attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Conditional-write conflicts and missing keys will not succeed on retry
fn is_retryable(error: &anyhow::Error) -> bool {
    let message = error.to_string();
    !(message.contains("PreconditionFailed")
        || message.contains("NoSuchKey")
        || message.contains("AccessDenied"))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str, overwrite: Overwrite) -> Result<()> {
        info!("Storing file to S3: {}/{} ({} bytes)", self.config.bucket_name, key, data.len());

        self.retry_operation(&format!("put: {}", key), move || {
            let mut request = self
                .client
                .put_object()
                .bucket(&self.config.bucket_name)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(data.to_vec()));

            if overwrite == Overwrite::Forbid {
                request = request.if_none_match("*");
            }

            async move {
                request
                    .send()
                    .await
                    .map_err(|e| anyhow!("Failed to store file {}: {}", key, aws_sdk_s3::error::DisplayErrorContext(e)))?;
                Ok(())
            }
        })
        .await?;

        info!("Successfully stored file: {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let bytes = self
            .retry_operation(&format!("get: {}", key), move || async move {
                let response = self
                    .client
                    .get_object()
                    .bucket(&self.config.bucket_name)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| anyhow!("Failed to retrieve file {}: {}", key, aws_sdk_s3::error::DisplayErrorContext(e)))?;

                let body = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| anyhow!("Failed to read file body: {}", e))?;

                Ok(body.into_bytes().to_vec())
            })
            .await?;

        debug!("Retrieved file: {} ({} bytes)", key, bytes.len());
        Ok(bytes)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        info!("Deleting file from S3: {}/{}", self.config.bucket_name, key);

        // S3 treats deleting a missing key as success
        self.retry_operation(&format!("delete: {}", key), move || async move {
            self.client
                .delete_object()
                .bucket(&self.config.bucket_name)
                .key(key)
                .send()
                .await
                .map_err(|e| anyhow!("Failed to delete file {}: {}", key, aws_sdk_s3::error::DisplayErrorContext(e)))?;
            Ok(())
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(anyhow!("Failed to check file existence {}: {}", key, e))
                }
            }
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .presigned(PresigningConfig::expires_in(ttl)?)
            .await
            .map_err(|e| anyhow!("Failed to presign {}: {}", key, e))?;

        Ok(Some(presigned.uri().to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        if let Some(base) = &self.config.public_base_url {
            return join_public_url(base, key);
        }

        match &self.config.endpoint_url {
            Some(endpoint) if !endpoint.is_empty() => {
                join_public_url(&format!("{}/{}", endpoint.trim_end_matches('/'), self.config.bucket_name), key)
            }
            _ => join_public_url(
                &format!("https://{}.s3.{}.amazonaws.com", self.config.bucket_name, self.config.region),
                key,
            ),
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn initialize(&self) -> Result<()> {
        self.test_connection().await?;
        info!("S3 blob store initialized successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config {
            bucket_name: "test-bucket".to_string(),
            region: "eu-west-2".to_string(),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            endpoint_url: None,
            public_base_url: None,
        }
    }

    #[tokio::test]
    async fn test_s3_config_creation() {
        // This will create the client but won't test actual S3 access
        let store = S3BlobStore::new(test_config()).await;
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_s3_requires_bucket() {
        let mut config = test_config();
        config.bucket_name = String::new();

        let result = S3BlobStore::new(config).await;
        assert!(result.unwrap_err().to_string().contains("Bucket name is required"));
    }

    #[tokio::test]
    async fn test_s3_rejects_half_credentials() {
        let mut config = test_config();
        config.secret_access_key = String::new();
        assert!(S3BlobStore::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_s3_public_url_variants() {
        let store = S3BlobStore::new(test_config()).await.unwrap();
        assert_eq!(
            store.public_url("documents/a.pdf"),
            "https://test-bucket.s3.eu-west-2.amazonaws.com/documents/a.pdf"
        );

        let mut config = test_config();
        config.endpoint_url = Some("http://localhost:9000/".to_string());
        let store = S3BlobStore::new(config).await.unwrap();
        assert_eq!(store.public_url("documents/a.pdf"), "http://localhost:9000/test-bucket/documents/a.pdf");

        let mut config = test_config();
        config.public_base_url = Some("https://cdn.example.com".to_string());
        let store = S3BlobStore::new(config).await.unwrap();
        assert_eq!(store.public_url("documents/a.pdf"), "https://cdn.example.com/documents/a.pdf");
    }

    #[tokio::test]
    async fn test_s3_presign_is_local() {
        // Presigning is computed client-side, no network needed
        let store = S3BlobStore::new(test_config()).await.unwrap();
        let url = store
            .signed_url("documents/a.pdf", Duration::from_secs(3600))
            .await
            .unwrap()
            .unwrap();
        assert!(url.contains("documents/a.pdf"));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&anyhow!("dispatch failure: connection reset")));
        assert!(!is_retryable(&anyhow!("PreconditionFailed: At least one of the pre-conditions you specified did not hold")));
        assert!(!is_retryable(&anyhow!("NoSuchKey")));
    }
}
