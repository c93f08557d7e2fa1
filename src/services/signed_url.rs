use std::{sync::Arc, time::Duration};

use crate::storage::BlobStore;

/// Issues time-limited read URLs, falling back to the backend's public URL
/// when it cannot sign
#[derive(Clone)]
pub struct SignedUrlIssuer {
    blob_store: Arc<dyn BlobStore>,
    ttl: Duration,
}

impl SignedUrlIssuer {
    pub fn new(blob_store: Arc<dyn BlobStore>, ttl: Duration) -> Self {
        Self { blob_store, ttl }
    }

    pub async fn issue(&self, storage_key: &str) -> String {
        match self.blob_store.signed_url(storage_key, self.ttl).await {
            Ok(Some(url)) => url,
            Ok(None) => self.blob_store.public_url(storage_key),
            Err(e) => {
                tracing::warn!(
                    storage_key,
                    backend = self.blob_store.backend_name(),
                    "Failed to sign URL, using public URL instead: {:#}",
                    e
                );
                self.blob_store.public_url(storage_key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{memory::MemoryBlobStore, Overwrite};
    use anyhow::Result;
    use async_trait::async_trait;

    struct SigningStore;

    #[async_trait]
    impl BlobStore for SigningStore {
        async fn put(&self, _: &str, _: &[u8], _: &str, _: Overwrite) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn delete(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool> {
            Ok(true)
        }
        async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
            if key.starts_with("broken") {
                anyhow::bail!("signing key unavailable");
            }
            Ok(Some(format!("https://signed.example/{}?ttl={}", key, ttl.as_secs())))
        }
        fn public_url(&self, key: &str) -> String {
            format!("https://public.example/{}", key)
        }
        fn backend_name(&self) -> &'static str {
            "signing"
        }
    }

    #[tokio::test]
    async fn test_signed_url_preferred() {
        let issuer = SignedUrlIssuer::new(Arc::new(SigningStore), Duration::from_secs(3600));
        assert_eq!(issuer.issue("a/b.pdf").await, "https://signed.example/a/b.pdf?ttl=3600");
    }

    #[tokio::test]
    async fn test_signing_error_falls_back_to_public() {
        let issuer = SignedUrlIssuer::new(Arc::new(SigningStore), Duration::from_secs(60));
        assert_eq!(issuer.issue("broken/b.pdf").await, "https://public.example/broken/b.pdf");
    }

    #[tokio::test]
    async fn test_unsigned_backend_uses_public_url() {
        let store = MemoryBlobStore::with_public_base_url(Some("https://cdn.example".to_string()));
        let issuer = SignedUrlIssuer::new(Arc::new(store), Duration::from_secs(60));
        assert_eq!(issuer.issue("documents/x.pdf").await, "https://cdn.example/documents/x.pdf");
    }
}
