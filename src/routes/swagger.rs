use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::models::{
    DeleteDocumentResponse, Document, DocumentListItem, DocumentListResponse, LedgerEntry, OcrUploadResponse,
    RenameDocumentRequest, RenameDocumentResponse, SignedUrlResponse, UpdateDocumentRequest,
    UpdateDocumentResponse, UploadDocumentResponse,
};
use crate::routes::{documents, health, ocr};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        health::health_check,
        documents::upload_document,
        documents::list_documents,
        documents::download_document,
        documents::delete_document,
        documents::rename_document,
        documents::update_document,
        ocr::upload_for_ocr,
    ),
    components(
        schemas(
            Document,
            DocumentListItem,
            DocumentListResponse,
            UploadDocumentResponse,
            SignedUrlResponse,
            DeleteDocumentResponse,
            RenameDocumentRequest,
            RenameDocumentResponse,
            UpdateDocumentRequest,
            UpdateDocumentResponse,
            LedgerEntry,
            OcrUploadResponse,
        )
    ),
    tags(
        (name = "documents", description = "Document storage"),
        (name = "ocr", description = "Scanned invoice ingestion"),
        (name = "health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_document_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/documents/upload",
            "/api/documents",
            "/api/documents/download/{id}",
            "/api/documents/{id}",
            "/api/documents/{id}/rename",
            "/api/documents/{id}/update",
            "/api/ocr/documents/upload",
            "/api/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
