use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;

use crate::storage::{S3Config, SupabaseConfig};

/// Which blob store implementation to build at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Local,
    Memory,
    S3,
    Supabase,
}

impl FromStr for StorageBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3),
            "supabase" => Ok(Self::Supabase),
            other => Err(anyhow!(
                "Unknown STORAGE_BACKEND '{}' (expected local, memory, s3 or supabase)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub jwt_secret: String,

    // Storage
    pub storage_backend: StorageBackendKind,
    pub upload_path: String,
    pub public_base_url: Option<String>,
    pub s3_config: Option<S3Config>,
    pub supabase_config: Option<SupabaseConfig>,
    pub signed_url_ttl_seconds: u64,
    pub max_file_size_mb: u64,

    // OCR
    pub temp_dir: String,
    pub ocr_language: String,
    pub ocr_raster_dpi: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine, real deployments set the environment directly
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow!("JWT_SECRET must be set"))?;
        if jwt_secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackendKind>()?;

        let public_base_url = optional_var("STORAGE_PUBLIC_BASE_URL");

        Ok(Config {
            database_url: database_url_from_env(),
            server_address: env::var("SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            jwt_secret,
            storage_backend,
            upload_path: env::var("UPLOAD_PATH").unwrap_or_else(|_| "./uploads".to_string()),
            s3_config: s3_config_from_env(public_base_url.clone()),
            supabase_config: supabase_config_from_env(),
            public_base_url,
            signed_url_ttl_seconds: parse_var("SIGNED_URL_TTL_SECONDS", 3600)?,
            max_file_size_mb: parse_var("MAX_FILE_SIZE_MB", 25)?,
            temp_dir: env::var("TEMP_DIR")
                .unwrap_or_else(|_| env::temp_dir().to_string_lossy().to_string()),
            ocr_language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
            ocr_raster_dpi: parse_var("OCR_RASTER_DPI", 300)?,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_file_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// DATABASE_URL wins; otherwise assemble one from the POSTGRES_* parts
fn database_url_from_env() -> String {
    if let Ok(url) = env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return url;
        }
    }

    let host = env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    let db = env::var("POSTGRES_DB").unwrap_or_else(|_| "propdocs".to_string());
    let user = env::var("POSTGRES_USER").unwrap_or_else(|_| "propdocs".to_string());
    let password = env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "propdocs".to_string());

    format!("postgresql://{}:{}@{}:{}/{}", user, password, host, port, db)
}

fn s3_config_from_env(public_base_url: Option<String>) -> Option<S3Config> {
    let bucket_name = optional_var("S3_BUCKET_NAME")?;

    Some(S3Config {
        bucket_name,
        region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        access_key_id: env::var("S3_ACCESS_KEY_ID").unwrap_or_default(),
        secret_access_key: env::var("S3_SECRET_ACCESS_KEY").unwrap_or_default(),
        endpoint_url: optional_var("S3_ENDPOINT_URL"),
        public_base_url,
    })
}

fn supabase_config_from_env() -> Option<SupabaseConfig> {
    Some(SupabaseConfig {
        url: optional_var("SUPABASE_URL")?,
        service_role_key: optional_var("SUPABASE_SERVICE_ROLE_KEY")?,
        bucket_name: env::var("SUPABASE_BUCKET")
            .or_else(|_| env::var("S3_BUCKET_NAME"))
            .unwrap_or_else(|_| "documents".to_string()),
    })
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}
