//! Request-level error taxonomy and its HTTP mapping
//!
//! Storage backends, database helpers and tooling work with `anyhow`; the
//! document and OCR services convert into [`AppError`] at their boundary so
//! handlers can return `Result<_, AppError>` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ocr::error::OcrError;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage operation failed: {0:#}")]
    StorageFailure(anyhow::Error),

    #[error("OCR processing failed: {0}")]
    OcrFailure(#[from] OcrError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn storage(error: anyhow::Error) -> Self {
        AppError::StorageFailure(error)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageFailure(_)
            | AppError::OcrFailure(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    /// Server-side failures stay generic; details go to the log only.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Unauthenticated => "Authentication required".to_string(),
            AppError::Forbidden => "You do not have permission to perform this action".to_string(),
            AppError::Validation(message) => message.clone(),
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::StorageFailure(_) => "File storage operation failed".to_string(),
            AppError::OcrFailure(_) => "Document text extraction failed".to_string(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.client_message(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::validation("missing file").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("Document").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::storage(anyhow::anyhow!("bucket gone")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_message_hides_internals() {
        let error = AppError::storage(anyhow::anyhow!("secret-bucket returned AccessDenied"));
        assert!(!error.client_message().contains("secret-bucket"));

        let error = AppError::Internal(anyhow::anyhow!("connection string postgres://u:p@h"));
        assert_eq!(error.client_message(), "Internal server error");

        // Forbidden never names the resource
        assert!(!AppError::Forbidden.client_message().contains("document"));
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        use http_body_util::BodyExt;

        let response = AppError::validation("No file provided").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "No file provided");
    }
}
