use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    models::{
        DeleteDocumentResponse, DocumentListResponse, RenameDocumentRequest, RenameDocumentResponse,
        SignedUrlResponse, UpdateDocumentRequest, UpdateDocumentResponse, UploadDocumentRequest,
        UploadDocumentResponse,
    },
    utils::ocr::resolve_mime_type,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_documents))
        .route("/upload", post(upload_document))
        .route("/download/{id}", get(download_document))
        .route("/{id}", delete(delete_document))
        .route("/{id}/rename", patch(rename_document))
        .route("/{id}/update", patch(update_document))
}

#[utoipa::path(
    post,
    path = "/api/documents/upload",
    tag = "documents",
    security(
        ("bearer_auth" = [])
    ),
    request_body(content = String, description = "Multipart form: file plus optional landlord_id, property_id, tenant_id, category, shared_with_tenant, custom_name", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document stored and registered", body = UploadDocumentResponse),
        (status = 400, description = "Missing file or malformed field"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the landlord"),
        (status = 404, description = "Property not found"),
        (status = 500, description = "Storage failure; nothing was kept")
    )
)]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadDocumentResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::validation(e.body_text()))?;
    let mut request = UploadDocumentRequest::default();
    let mut declared_mime = None;
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                request.original_name = field.file_name().unwrap_or("upload").to_string();
                declared_mime = field.content_type().map(str::to_string);
                request.data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(e.body_text()))?
                    .to_vec();
                has_file = true;
            }
            "landlord_id" => request.landlord_id = uuid_field(field, "landlord_id").await?,
            "property_id" => request.property_id = uuid_field(field, "property_id").await?,
            "tenant_id" => request.tenant_id = uuid_field(field, "tenant_id").await?,
            "category" => request.category = text_field(field).await?,
            "custom_name" => request.custom_name = text_field(field).await?,
            "shared_with_tenant" => {
                request.shared_with_tenant = text_field(field)
                    .await?
                    .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "on" | "yes"))
                    .unwrap_or(false);
            }
            _ => {
                tracing::debug!("Ignoring unknown upload field '{}'", name);
            }
        }
    }

    if !has_file {
        return Err(AppError::validation("No file provided"));
    }
    request.mime_type = resolve_mime_type(&request.data, declared_mime.as_deref(), &request.original_name);

    info!(
        account_id = %auth_user.account_id,
        file_name = %request.original_name,
        size = request.data.len(),
        "Document upload received"
    );

    let document = state.documents.upload(auth_user.account_id, request).await?;
    Ok(Json(UploadDocumentResponse {
        success: true,
        document,
    }))
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "documents",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Documents uploaded by the caller", body = DocumentListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<DocumentListResponse>> {
    let documents = state.documents.list(auth_user.account_id).await?;
    Ok(Json(DocumentListResponse { documents }))
}

#[utoipa::path(
    get,
    path = "/api/documents/download/{id}",
    tag = "documents",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Time-limited download URL", body = SignedUrlResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<SignedUrlResponse>> {
    let id = document_id(id)?;
    let signed_url = state.documents.download_url(auth_user.account_id, id).await?;
    Ok(Json(SignedUrlResponse {
        success: true,
        signed_url,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "documents",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document deleted", body = DeleteDocumentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<DeleteDocumentResponse>> {
    let id = document_id(id)?;
    let id = state.documents.delete(auth_user.account_id, id).await?;
    Ok(Json(DeleteDocumentResponse { success: true, id }))
}

#[utoipa::path(
    patch,
    path = "/api/documents/{id}/rename",
    tag = "documents",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    request_body = RenameDocumentRequest,
    responses(
        (status = 200, description = "Document renamed", body = RenameDocumentResponse),
        (status = 400, description = "Invalid name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Storage failure; document unchanged")
    )
)]
pub async fn rename_document(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RenameDocumentRequest>, JsonRejection>,
) -> AppResult<Json<RenameDocumentResponse>> {
    let id = document_id(id)?;
    let Json(request) = body.map_err(|e| AppError::validation(e.body_text()))?;

    let (document, file_url) = state.documents.rename(auth_user.account_id, id, request).await?;
    Ok(Json(RenameDocumentResponse {
        success: true,
        id: document.id,
        file_name: document.file_name,
        file_url,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/documents/{id}/update",
    tag = "documents",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Document updated", body = UpdateDocumentResponse),
        (status = 400, description = "Malformed request body"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Document or property not found"),
        (status = 500, description = "Storage failure; document unchanged")
    )
)]
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateDocumentRequest>, JsonRejection>,
) -> AppResult<Json<UpdateDocumentResponse>> {
    let id = document_id(id)?;
    let Json(request) = body.map_err(|e| AppError::validation(e.body_text()))?;

    let document = state.documents.update(auth_user.account_id, id, request).await?;
    Ok(Json(UpdateDocumentResponse {
        success: true,
        document,
    }))
}

fn document_id(id: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    id.map(|Path(id)| id)
        .map_err(|_| AppError::validation("Invalid document id"))
}

/// Non-empty trimmed text value of a form field
pub(crate) async fn text_field(field: Field<'_>) -> AppResult<Option<String>> {
    let value = field.text().await.map_err(|e| AppError::validation(e.body_text()))?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

async fn uuid_field(field: Field<'_>, name: &str) -> AppResult<Option<Uuid>> {
    match text_field(field).await? {
        Some(value) => Uuid::parse_str(&value)
            .map(Some)
            .map_err(|_| AppError::validation(format!("Malformed {}", name))),
        None => Ok(None),
    }
}
