use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Category assigned to expenses created from scanned uploads
pub const SCANNED_DOCUMENT_CATEGORY: &str = "Scanned Document";

/// Description assigned to expenses created from scanned uploads
pub const SCANNED_DOCUMENT_DESCRIPTION: &str = "Auto-extracted from upload";

/// Expense record derived from an OCR-extracted amount.
/// It carries no reference back to the source file.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub landlord_id: Uuid,
    #[serde(rename = "amount", serialize_with = "serialize_cents")]
    #[schema(value_type = f64)]
    pub amount_cents: i64,
    pub category: String,
    pub description: String,
    pub expense_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub landlord_id: Uuid,
    pub amount_cents: i64,
    pub category: String,
    pub description: String,
    pub expense_date: NaiveDate,
}

impl NewLedgerEntry {
    pub fn scanned_document(landlord_id: Uuid, amount_cents: i64, expense_date: NaiveDate) -> Self {
        Self {
            landlord_id,
            amount_cents,
            category: SCANNED_DOCUMENT_CATEGORY.to_string(),
            description: SCANNED_DOCUMENT_DESCRIPTION.to_string(),
            expense_date,
        }
    }
}

/// Render minor units as a decimal major-unit amount
pub fn cents_to_major(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn serialize_cents<S: Serializer>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(cents_to_major(*cents))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OcrUploadResponse {
    pub success: bool,
    /// Raw text extracted from every page, in page order
    pub text: String,
    /// Detected amount, `null` when nothing currency-like was found
    pub amount: Option<f64>,
    pub expense: Option<LedgerEntry>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_entry_serializes_amount_as_decimal() {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            landlord_id: Uuid::new_v4(),
            amount_cents: 12_050,
            category: SCANNED_DOCUMENT_CATEGORY.to_string(),
            description: SCANNED_DOCUMENT_DESCRIPTION.to_string(),
            expense_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["amount"], 120.5);
        assert!(value.get("amount_cents").is_none());
        assert_eq!(value["category"], "Scanned Document");
        assert_eq!(value["expense_date"], "2024-03-01");
    }
}
