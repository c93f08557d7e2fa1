//! Factory for creating blob stores based on configuration

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use super::local::LocalBlobStore;
use super::memory::MemoryBlobStore;
use super::supabase::SupabaseBlobStore;
use super::{BlobStore, StorageConfig};
use crate::config::{Config, StorageBackendKind};

#[cfg(feature = "s3")]
use super::s3::S3BlobStore;

/// Create a blob store based on the provided configuration
pub async fn create_blob_store(config: StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config {
        StorageConfig::Local { upload_path, public_base_url } => {
            Arc::new(LocalBlobStore::new(upload_path, public_base_url))
        }
        StorageConfig::Memory { public_base_url } => {
            Arc::new(MemoryBlobStore::with_public_base_url(public_base_url))
        }
        #[cfg(feature = "s3")]
        StorageConfig::S3(s3_config) => Arc::new(S3BlobStore::new(s3_config).await?),
        StorageConfig::Supabase(supabase_config) => Arc::new(SupabaseBlobStore::new(supabase_config)?),
    };

    store.initialize().await?;
    info!("Using {} blob store", store.backend_name());
    Ok(store)
}

/// Create storage configuration from the application config
pub fn storage_config_from_env(config: &Config) -> Result<StorageConfig> {
    match config.storage_backend {
        StorageBackendKind::S3 => {
            #[cfg(feature = "s3")]
            {
                let s3_config = config
                    .s3_config
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("STORAGE_BACKEND=s3 requires S3_BUCKET_NAME"))?;
                Ok(StorageConfig::S3(s3_config))
            }
            #[cfg(not(feature = "s3"))]
            {
                // S3 requested but not compiled in
                warn!("S3 storage requested but S3 feature not compiled in, using local storage");
                Ok(StorageConfig::Local {
                    upload_path: config.upload_path.clone(),
                    public_base_url: config.public_base_url.clone(),
                })
            }
        }
        StorageBackendKind::Supabase => {
            let supabase_config = config.supabase_config.clone().ok_or_else(|| {
                anyhow::anyhow!("STORAGE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY")
            })?;
            Ok(StorageConfig::Supabase(supabase_config))
        }
        StorageBackendKind::Memory => {
            warn!("Using in-memory blob store, objects will not survive a restart");
            Ok(StorageConfig::Memory {
                public_base_url: config.public_base_url.clone(),
            })
        }
        StorageBackendKind::Local => Ok(StorageConfig::Local {
            upload_path: config.upload_path.clone(),
            public_base_url: config.public_base_url.clone(),
        }),
    }
}
