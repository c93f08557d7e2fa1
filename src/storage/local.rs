//! Local filesystem blob store implementation

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, error, info};

use super::{join_public_url, BlobStore, Overwrite};

/// Default URL prefix under which the server exposes local objects
pub const DEFAULT_LOCAL_PUBLIC_PREFIX: &str = "/files";

/// Local filesystem blob store
pub struct LocalBlobStore {
    upload_path: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Create a new local blob store rooted at `upload_path`
    pub fn new(upload_path: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            upload_path: upload_path.into(),
            public_base_url: public_base_url.unwrap_or_else(|| DEFAULT_LOCAL_PUBLIC_PREFIX.to_string()),
        }
    }

    /// Resolve an object key to a file path, refusing anything that escapes the root
    fn resolve_key(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\0') {
            return Err(anyhow!("Invalid object key: {:?}", key));
        }

        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(anyhow!("Object key escapes storage root: {}", key)),
            }
        }

        Ok(self.upload_path.join(relative))
    }
}

/// Fill a sibling temp file and move it onto `target` in one rename, so a
/// failed write never leaves a partial object at the key. The temp file is
/// removed on drop when anything fails.
fn write_then_persist<F>(target: &Path, overwrite: Overwrite, fill: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let parent = target
        .parent()
        .ok_or_else(|| anyhow!("Object path has no parent: {}", target.display()))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    fill(&mut temp).with_context(|| format!("Failed to write {}", target.display()))?;

    let persisted = match overwrite {
        Overwrite::Allow => temp.persist(target),
        Overwrite::Forbid => temp.persist_noclobber(target),
    };
    persisted
        .map(|_| ())
        .map_err(|e| anyhow!("Failed to store {}: {}", target.display(), e.error))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str, overwrite: Overwrite) -> Result<()> {
        let file_path = self.resolve_key(key)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let data = data.to_vec();
        let target = file_path.clone();
        tokio::task::spawn_blocking(move || {
            write_then_persist(&target, overwrite, |file| {
                file.write_all(&data)?;
                file.as_file().sync_all()
            })
        })
        .await
        .context("Local write task failed")??;

        info!("Stored object locally: {}", file_path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let file_path = self.resolve_key(key)?;
        let data = fs::read(&file_path)
            .await
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let file_path = self.resolve_key(key)?;

        match fs::remove_file(&file_path).await {
            Ok(_) => {
                info!("Deleted file: {}", file_path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("File already deleted: {}", file_path.display());
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete file {}: {}", file_path.display(), e);
                Err(anyhow!("Failed to delete file {}: {}", file_path.display(), e))
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let file_path = self.resolve_key(key)?;
        Ok(fs::try_exists(&file_path).await?)
    }

    async fn signed_url(&self, _key: &str, _ttl: Duration) -> Result<Option<String>> {
        Ok(None)
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn initialize(&self) -> Result<()> {
        let documents_dir = self.upload_path.join(super::paths::DOCUMENTS_PREFIX);
        if let Err(e) = fs::create_dir_all(&documents_dir).await {
            error!("Failed to create directory {:?}: {}", documents_dir, e);
            return Err(anyhow!("Failed to create directory structure: {}", e));
        }
        info!("Ensured directory exists: {:?}", documents_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_round_trip_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path(), None);
        store.initialize().await.unwrap();

        let key = "documents/landlord_none/property_none/document_1-a.pdf";
        store.put(key, b"%PDF-1.4", "application/pdf", Overwrite::Forbid).await.unwrap();

        assert!(store.exists(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), b"%PDF-1.4");

        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
        // Missing objects delete cleanly
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_forbid_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path(), None);

        store.put("documents/x.txt", b"first", "text/plain", Overwrite::Forbid).await.unwrap();
        assert!(store.put("documents/x.txt", b"second", "text/plain", Overwrite::Forbid).await.is_err());
        assert_eq!(store.get("documents/x.txt").await.unwrap(), b"first");
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_interrupted_write_leaves_nothing_at_key() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("document_1-a.pdf");

        let result = write_then_persist(&target, Overwrite::Forbid, |file| {
            file.write_all(b"%PDF-1.4 trunc")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        });

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(dir_entries(dir.path()).is_empty(), "temp file should be removed");

        // The key is still free for a later write
        write_then_persist(&target, Overwrite::Forbid, |file| file.write_all(b"%PDF-1.4")).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_local_refused_overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path(), None);

        store.put("documents/x.pdf", b"first", "application/pdf", Overwrite::Forbid).await.unwrap();
        assert!(store.put("documents/x.pdf", b"second", "application/pdf", Overwrite::Forbid).await.is_err());

        assert_eq!(dir_entries(&dir.path().join("documents")), vec!["x.pdf".to_string()]);

        store.put("documents/x.pdf", b"third", "application/pdf", Overwrite::Allow).await.unwrap();
        assert_eq!(store.get("documents/x.pdf").await.unwrap(), b"third");
    }

    #[tokio::test]
    async fn test_local_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path(), None);

        assert!(store.put("../escape.txt", b"x", "text/plain", Overwrite::Allow).await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
        assert!(store.exists("").await.is_err());
    }

    #[tokio::test]
    async fn test_local_has_no_signing() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path(), Some("https://files.example.com".to_string()));

        assert!(store.signed_url("documents/a.pdf", Duration::from_secs(60)).await.unwrap().is_none());
        assert_eq!(store.public_url("documents/a.pdf"), "https://files.example.com/documents/a.pdf");
    }
}
