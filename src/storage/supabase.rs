//! Supabase Storage blob store implementation (REST API, service-role key)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{join_public_url, BlobStore, Overwrite, SupabaseConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SupabaseBlobStore {
    http: Client,
    config: SupabaseConfig,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseBlobStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(anyhow!("Supabase URL is required"));
        }
        if config.service_role_key.is_empty() {
            return Err(anyhow!("Supabase service role key is required"));
        }
        if config.bucket_name.is_empty() {
            return Err(anyhow!("Bucket name is required"));
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    fn storage_base(&self) -> String {
        format!("{}/storage/v1", self.config.url.trim_end_matches('/'))
    }

    fn object_url(&self, key: &str) -> String {
        join_public_url(&format!("{}/object/{}", self.storage_base(), self.config.bucket_name), key)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
    }
}

/// Turn a non-success response into an error carrying the body for diagnostics
async fn ensure_success(response: reqwest::Response, action: &str, key: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("Supabase {} failed for {} ({}): {}", action, key, status, body))
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str, overwrite: Overwrite) -> Result<()> {
        info!("Storing file to Supabase: {}/{}", self.config.bucket_name, key);

        let upsert = matches!(overwrite, Overwrite::Allow);
        let response = self
            .authorized(self.http.post(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(data.to_vec())
            .send()
            .await
            .with_context(|| format!("Failed to store file {}", key))?;

        ensure_success(response, "upload", key).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .authorized(self.http.get(self.object_url(key)))
            .send()
            .await
            .with_context(|| format!("Failed to retrieve file {}", key))?;

        let response = ensure_success(response, "download", key).await?;
        let bytes = response.bytes().await.context("Failed to read file body")?;
        debug!("Retrieved file: {} ({} bytes)", key, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        info!("Deleting file from Supabase: {}/{}", self.config.bucket_name, key);

        let url = format!("{}/object/{}", self.storage_base(), self.config.bucket_name);
        let response = self
            .authorized(self.http.delete(url))
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await
            .with_context(|| format!("Failed to delete file {}", key))?;

        ensure_success(response, "delete", key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self
            .authorized(self.http.head(self.object_url(key)))
            .send()
            .await
            .with_context(|| format!("Failed to check file existence {}", key))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            // Supabase reports missing objects as 400 on some versions
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            status => Err(anyhow!("Failed to check file existence {}: {}", key, status)),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let url = join_public_url(
            &format!("{}/object/sign/{}", self.storage_base(), self.config.bucket_name),
            key,
        );
        let response = self
            .authorized(self.http.post(url))
            .json(&json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await
            .with_context(|| format!("Failed to sign {}", key))?;

        let response = ensure_success(response, "sign", key).await?;
        let signed: SignResponse = response.json().await.context("Malformed sign response")?;

        Ok(Some(format!("{}{}", self.storage_base(), signed.signed_url)))
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(
            &format!("{}/object/public/{}", self.storage_base(), self.config.bucket_name),
            key,
        )
    }

    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    async fn initialize(&self) -> Result<()> {
        let url = format!("{}/bucket/{}", self.storage_base(), self.config.bucket_name);
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .context("Failed to reach Supabase Storage")?;
        ensure_success(response, "bucket lookup", &self.config.bucket_name).await?;
        info!("Supabase blob store initialized successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> SupabaseBlobStore {
        SupabaseBlobStore::new(SupabaseConfig {
            url: server.uri(),
            service_role_key: "service-key".to_string(),
            bucket_name: "documents".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_requires_configuration() {
        let result = SupabaseBlobStore::new(SupabaseConfig {
            url: String::new(),
            service_role_key: "k".to_string(),
            bucket_name: "b".to_string(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_put_forbid_sends_no_upsert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/documents/documents/a.pdf"))
            .and(header("x-upsert", "false"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "documents/a.pdf" })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        store
            .put("documents/a.pdf", b"data", "application/pdf", Overwrite::Forbid)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_conflict_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("The resource already exists"))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let result = store.put("documents/a.pdf", b"data", "application/pdf", Overwrite::Forbid).await;
        assert!(result.unwrap_err().to_string().contains("409"));
    }

    #[tokio::test]
    async fn test_signed_url_is_absolute() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/documents/documents/a.pdf"))
            .and(body_json(json!({ "expiresIn": 3600 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signedURL": "/object/sign/documents/documents/a.pdf?token=abc"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let url = store
            .signed_url("documents/a.pdf", Duration::from_secs(3600))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/sign/documents/documents/a.pdf?token=abc", server.uri())
        );
    }

    #[tokio::test]
    async fn test_exists_maps_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/storage/v1/object/documents/documents/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/storage/v1/object/documents/documents/present.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(!store.exists("documents/missing.pdf").await.unwrap());
        assert!(store.exists("documents/present.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_public_url() {
        let server = MockServer::start().await;
        let store = store_for(&server);
        assert_eq!(
            store.public_url("documents/a.pdf"),
            format!("{}/storage/v1/object/public/documents/documents/a.pdf", server.uri())
        );
    }
}
