use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    models::OcrUploadResponse,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/documents/upload", post(upload_for_ocr))
}

#[utoipa::path(
    post,
    path = "/api/ocr/documents/upload",
    tag = "ocr",
    security(
        ("bearer_auth" = [])
    ),
    request_body(content = String, description = "Multipart form with a single `file` field (PDF, JPEG or PNG)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Text extracted; expense created when an amount was found", body = OcrUploadResponse),
        (status = 400, description = "Missing or unsupported file"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Caller has no landlord profile"),
        (status = 500, description = "OCR failed")
    )
)]
pub async fn upload_for_ocr(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<OcrUploadResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::validation(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| AppError::validation(e.body_text()))?;

        info!(
            account_id = %auth_user.account_id,
            file_name = %file_name,
            size = data.len(),
            "Scanned document received for OCR"
        );

        let response = state
            .expenses
            .ingest(auth_user.account_id, &file_name, content_type.as_deref(), &data)
            .await?;
        return Ok(Json(response));
    }

    Err(AppError::validation("No file provided"))
}
