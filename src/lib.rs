pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod ocr;
pub mod routes;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(feature = "test-utils")]
pub mod test_utils;


use axum::{extract::DefaultBodyLimit, Router};
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::{Config, StorageBackendKind};
use db::Database;
use ocr::OcrPipeline;
use services::{documents::DocumentService, expense_extraction::ExpenseExtractionService};
use storage::BlobStore;

/// Public mount point for objects served by the local backend
pub const LOCAL_FILES_ROUTE: &str = "/files";

pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub blob_store: Arc<dyn BlobStore>,
    pub documents: DocumentService,
    pub expenses: ExpenseExtractionService,
}

impl AppState {
    pub fn new(db: Database, config: Config, blob_store: Arc<dyn BlobStore>, ocr: Arc<OcrPipeline>) -> Self {
        let documents = DocumentService::new(
            db.clone(),
            blob_store.clone(),
            Duration::from_secs(config.signed_url_ttl_seconds),
        );
        let expenses = ExpenseExtractionService::new(db.clone(), ocr);

        Self {
            db,
            config,
            blob_store,
            documents,
            expenses,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/documents", routes::documents::router())
        .nest("/ocr", routes::ocr::router())
        .merge(routes::health::router());

    let mut app = Router::new()
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", routes::swagger::ApiDoc::openapi()));

    // Local objects without an external host are served by this process
    if state.config.storage_backend == StorageBackendKind::Local && state.config.public_base_url.is_none() {
        app = app.nest_service(LOCAL_FILES_ROUTE, ServeDir::new(&state.config.upload_path));
    }

    app.layer(DefaultBodyLimit::max(state.config.max_upload_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
