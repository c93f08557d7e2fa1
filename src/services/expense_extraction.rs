use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::{cents_to_major, NewLedgerEntry, OcrUploadResponse},
    ocr::OcrPipeline,
    utils::ocr::detect_input_kind,
};

/// OCR ingestion: scanned invoice in, ledger entry out
#[derive(Clone)]
pub struct ExpenseExtractionService {
    db: Database,
    pipeline: Arc<OcrPipeline>,
}

impl ExpenseExtractionService {
    pub fn new(db: Database, pipeline: Arc<OcrPipeline>) -> Self {
        Self { db, pipeline }
    }

    pub async fn ingest(
        &self,
        account_id: Uuid,
        file_name: &str,
        declared_mime: Option<&str>,
        data: &[u8],
    ) -> AppResult<OcrUploadResponse> {
        if data.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }

        let kind = detect_input_kind(data, declared_mime, file_name)
            .ok_or_else(|| AppError::validation("Only PDF, JPEG and PNG files can be scanned"))?;

        let landlord_id = self
            .db
            .get_landlord_for_account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("Landlord profile"))?;

        let outcome = self.pipeline.process(kind, data).await.map_err(|e| {
            error!(account_id = %account_id, file_name, "OCR pipeline failed: {}", e);
            AppError::OcrFailure(e)
        })?;

        let Some(amount_cents) = outcome.amount_cents else {
            info!(account_id = %account_id, file_name, "No amount found in scanned document");
            return Ok(OcrUploadResponse {
                success: true,
                text: outcome.text,
                amount: None,
                expense: None,
                message: "No amount could be detected in the document".to_string(),
            });
        };

        let expense = self
            .db
            .create_ledger_entry(&NewLedgerEntry::scanned_document(
                landlord_id,
                amount_cents,
                Utc::now().date_naive(),
            ))
            .await?;

        info!(
            landlord_id = %landlord_id,
            expense_id = %expense.id,
            amount_cents,
            "Created expense from scanned document"
        );

        Ok(OcrUploadResponse {
            success: true,
            text: outcome.text,
            amount: Some(cents_to_major(amount_cents)),
            expense: Some(expense),
            message: format!("Detected amount {:.2} and recorded an expense", cents_to_major(amount_cents)),
        })
    }
}
