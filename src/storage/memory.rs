//! In-process blob store backed by a map

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use super::{join_public_url, BlobStore, Overwrite};

/// Blob store that keeps every object in memory.
///
/// Used by the test harness and for local development without object storage.
/// It cannot sign URLs, so callers exercise the public-URL fallback.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    public_base_url: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_base_url(public_base_url: Option<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            public_base_url,
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str, overwrite: Overwrite) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| anyhow!("memory blob store lock poisoned"))?;

        if overwrite == Overwrite::Forbid && objects.contains_key(key) {
            return Err(anyhow!("Object already exists: {}", key));
        }

        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow!("memory blob store lock poisoned"))?;

        objects
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("Object not found: {}", key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| anyhow!("memory blob store lock poisoned"))?;
        objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow!("memory blob store lock poisoned"))?;
        Ok(objects.contains_key(key))
    }

    async fn signed_url(&self, _key: &str, _ttl: Duration) -> Result<Option<String>> {
        Ok(None)
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => join_public_url(base, key),
            None => format!("memory://{}", key),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryBlobStore::new();
        store.put("a/b.pdf", b"hello", "application/pdf", Overwrite::Allow).await.unwrap();

        assert!(store.exists("a/b.pdf").await.unwrap());
        assert_eq!(store.get("a/b.pdf").await.unwrap(), b"hello");

        store.delete("a/b.pdf").await.unwrap();
        assert!(!store.exists("a/b.pdf").await.unwrap());
        assert!(store.get("a/b.pdf").await.is_err());

        // Deleting again is fine
        store.delete("a/b.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_forbid_overwrite() {
        let store = MemoryBlobStore::new();
        store.put("k", b"one", "text/plain", Overwrite::Forbid).await.unwrap();

        let second = store.put("k", b"two", "text/plain", Overwrite::Forbid).await;
        assert!(second.is_err());
        assert_eq!(store.get("k").await.unwrap(), b"one");

        store.put("k", b"two", "text/plain", Overwrite::Allow).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_urls() {
        let store = MemoryBlobStore::with_public_base_url(Some("https://files.test".to_string()));
        assert!(store.signed_url("k", Duration::from_secs(60)).await.unwrap().is_none());
        assert_eq!(store.public_url("documents/k.pdf"), "https://files.test/documents/k.pdf");

        let bare = MemoryBlobStore::new();
        assert_eq!(bare.public_url("k"), "memory://k");
    }
}
