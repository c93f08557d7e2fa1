//! Blob storage abstraction for document files
//!
//! Document bytes live in an external, non-transactional object store. This
//! module provides one capability trait over the supported backends (S3,
//! Supabase Storage, local filesystem, in-memory). The backend is chosen once
//! at startup by [`factory::create_blob_store`] and shared as
//! `Arc<dyn BlobStore>`.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod factory;
pub mod local;
pub mod memory;
pub mod paths;
#[cfg(feature = "s3")]
pub mod s3;
pub mod supabase;

/// Whether a write may replace an existing object at the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    Allow,
    /// Fail if an object already exists at the key
    Forbid,
}

/// Core blob store capability that all storage implementations must implement
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write an object
    async fn put(&self, key: &str, data: &[u8], content_type: &str, overwrite: Overwrite) -> Result<()>;

    /// Read a whole object into memory
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if an object exists at the given key
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Produce a time-limited read URL.
    /// Returns `Ok(None)` when the backend has no signing capability.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Option<String>>;

    /// Unsigned URL for the object, used when signing is unavailable
    fn public_url(&self, key: &str) -> String;

    /// Get a human-readable identifier for this storage backend type
    fn backend_name(&self) -> &'static str;

    /// Initialize the backend (create directories, validate access, etc.)
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
}

/// S3-compatible object store settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint_url: Option<String>,
    /// Base URL for unsigned object links
    pub public_base_url: Option<String>,
}

/// Supabase Storage settings (service-role access)
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub service_role_key: String,
    pub bucket_name: String,
}

/// Storage configuration enum for different backend types
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem storage
    Local {
        upload_path: String,
        public_base_url: Option<String>,
    },
    /// Process-local map, for tests and development
    Memory {
        public_base_url: Option<String>,
    },
    /// S3-compatible storage
    #[cfg(feature = "s3")]
    S3(S3Config),
    /// Supabase Storage REST API
    Supabase(SupabaseConfig),
}

/// Join a base URL and an object key into a link
pub(crate) fn join_public_url(base: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_public_url() {
        assert_eq!(
            join_public_url("https://cdn.example.com/", "documents/a b.pdf"),
            "https://cdn.example.com/documents/a%20b.pdf"
        );
        assert_eq!(
            join_public_url("/files", "documents/landlord_none/x.pdf"),
            "/files/documents/landlord_none/x.pdf"
        );
    }
}
