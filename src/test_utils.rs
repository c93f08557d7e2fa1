/*!
 * Test harness
 *
 * Boots a disposable Postgres (testcontainers, or `TEST_DATABASE_URL` when
 * set), runs migrations, and wires the application with an in-memory blob
 * store and a scripted OCR engine. Requests go through the real router with
 * `tower::ServiceExt::oneshot`.
 */

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    auth::create_jwt,
    build_router,
    config::{Config, StorageBackendKind},
    db::Database,
    ocr::{detector::TextDetector, error::OcrError, rasterize::Rasterizer, OcrPipeline},
    storage::{memory::MemoryBlobStore, BlobStore},
    AppState,
};

pub const TEST_JWT_SECRET: &str = "test_jwt_secret_for_integration_tests";
const MULTIPART_BOUNDARY: &str = "propdocs-test-boundary";

/// Creates a test configuration with sensible defaults
pub fn create_test_config(database_url: &str, temp_dir: &Path) -> Config {
    Config {
        database_url: database_url.to_string(),
        server_address: "127.0.0.1:0".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        storage_backend: StorageBackendKind::Memory,
        upload_path: temp_dir.join("uploads").to_string_lossy().to_string(),
        public_base_url: None,
        s3_config: None,
        supabase_config: None,
        signed_url_ttl_seconds: 3600,
        max_file_size_mb: 5,
        temp_dir: temp_dir.join("ocr").to_string_lossy().to_string(),
        ocr_language: "eng".to_string(),
        ocr_raster_dpi: 300,
    }
}

/// Text detector returning fixed text for every page, or failing every page
pub struct StaticTextDetector {
    text: Option<String>,
}

impl StaticTextDetector {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()) }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl TextDetector for StaticTextDetector {
    async fn detect(&self, _image: &Path) -> Result<String, OcrError> {
        self.text.clone().ok_or_else(|| OcrError::DetectionFailed {
            page: 0,
            details: "scripted OCR failure".to_string(),
        })
    }
}

/// Rasterizer producing one blank page per PDF
pub struct SinglePageRasterizer;

#[async_trait]
impl Rasterizer for SinglePageRasterizer {
    async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let page = out_dir.join("page-1.png");
        tokio::fs::write(&page, b"\x89PNG\r\n\x1a\n").await?;
        Ok(vec![page])
    }
}

pub struct TestContextBuilder {
    blob_store: Option<Arc<dyn BlobStore>>,
    detector: Arc<dyn TextDetector>,
}

impl Default for TestContextBuilder {
    fn default() -> Self {
        Self {
            blob_store: None,
            detector: Arc::new(StaticTextDetector::new("")),
        }
    }
}

impl TestContextBuilder {
    /// Use this blob store instead of a fresh `MemoryBlobStore`
    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    pub fn with_text_detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_ocr_text(self, text: impl Into<String>) -> Self {
        self.with_text_detector(Arc::new(StaticTextDetector::new(text)))
    }

    pub async fn build(self) -> TestContext {
        let temp_dir = TempDir::new().expect("Failed to create test temp dir");

        let (database_url, container) = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => (url, None),
            Err(_) => {
                let container = Postgres::default()
                    .with_tag("16-alpine")
                    .start()
                    .await
                    .expect("Failed to start Postgres container");
                let host = container.get_host().await.expect("Failed to get container host");
                let port = container
                    .get_host_port_ipv4(5432)
                    .await
                    .expect("Failed to get container port");
                (
                    format!("postgresql://postgres:postgres@{}:{}/postgres", host, port),
                    Some(container),
                )
            }
        };

        let db = Database::new_with_pool_config(&database_url, 10, 1)
            .await
            .expect("Failed to connect to test database");
        db.migrate().await.expect("Failed to run migrations");

        let memory_store = Arc::new(MemoryBlobStore::new());
        let blob_store: Arc<dyn BlobStore> = match self.blob_store {
            Some(blob_store) => blob_store,
            None => memory_store.clone(),
        };

        let config = create_test_config(&database_url, temp_dir.path());
        let ocr = Arc::new(OcrPipeline::new(
            Arc::new(SinglePageRasterizer),
            self.detector,
            PathBuf::from(&config.temp_dir),
        ));

        let state = Arc::new(AppState::new(db, config, blob_store, ocr));
        let app = build_router(state.clone());

        TestContext {
            app,
            state,
            memory_store,
            _container: container,
            temp_dir,
        }
    }
}

pub struct TestContext {
    pub app: Router,
    pub state: Arc<AppState>,
    /// The default store; unused when a custom one was supplied
    pub memory_store: Arc<MemoryBlobStore>,
    _container: Option<ContainerAsync<Postgres>>,
    temp_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn builder() -> TestContextBuilder {
        TestContextBuilder::default()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Root of the OCR scratch directories
    pub fn ocr_temp_root(&self) -> PathBuf {
        PathBuf::from(&self.state.config.temp_dir)
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn token_for(&self, account_id: Uuid) -> String {
        create_jwt(account_id, TEST_JWT_SECRET).expect("Failed to create test token")
    }

    pub async fn create_landlord(&self, account_id: Uuid) -> Uuid {
        sqlx::query_scalar("INSERT INTO landlords (account_id, name) VALUES ($1, 'Test Landlord') RETURNING id")
            .bind(account_id)
            .fetch_one(&self.state.db.pool)
            .await
            .expect("Failed to create landlord")
    }

    pub async fn create_property(&self, landlord_id: Uuid, name: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO properties (landlord_id, name, address) VALUES ($1, $2, '1 Test Street') RETURNING id",
        )
        .bind(landlord_id)
        .bind(name)
        .fetch_one(&self.state.db.pool)
        .await
        .expect("Failed to create property")
    }

    pub async fn create_tenant(&self, property_id: Uuid, full_name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO tenants (property_id, full_name) VALUES ($1, $2) RETURNING id")
            .bind(property_id)
            .bind(full_name)
            .fetch_one(&self.state.db.pool)
            .await
            .expect("Failed to create tenant")
    }

    /// Rows for an account, placeholders included
    pub async fn count_document_rows(&self, account_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&self.state.db.pool)
            .await
            .expect("Failed to count documents")
    }

    /// Send a request through the router and decode the JSON body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router should not fail");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn cleanup_and_close(&self) -> Result<()> {
        self.state.db.pool.close().await;
        Ok(())
    }
}

/// JSON request with an optional bearer token
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("Failed to build request")
}

/// A file part for [`multipart_request`]
pub struct FilePart<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// Multipart POST with text fields and an optional `file` part
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                MULTIPART_BOUNDARY, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).expect("Failed to build request")
}
