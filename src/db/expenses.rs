use anyhow::Result;
use uuid::Uuid;

use super::Database;
use crate::models::{LedgerEntry, NewLedgerEntry};

const EXPENSE_COLUMNS: &str = "id, landlord_id, amount_cents, category, description, expense_date, created_at";

impl Database {
    pub async fn create_ledger_entry(&self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        let created = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"INSERT INTO expenses (landlord_id, amount_cents, category, description, expense_date)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {}"#,
            EXPENSE_COLUMNS
        ))
        .bind(entry.landlord_id)
        .bind(entry.amount_cents)
        .bind(&entry.category)
        .bind(&entry.description)
        .bind(entry.expense_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn list_ledger_entries(&self, landlord_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.with_retry(|| async {
            let rows = sqlx::query_as::<_, LedgerEntry>(&format!(
                "SELECT {} FROM expenses WHERE landlord_id = $1 ORDER BY created_at DESC",
                EXPENSE_COLUMNS
            ))
            .bind(landlord_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows)
        })
        .await
    }
}
