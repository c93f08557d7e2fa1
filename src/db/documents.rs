use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use super::Database;
use crate::models::{Document, DocumentWithRelations, NewDocument};

const DOCUMENT_COLUMNS: &str = "id, account_id, landlord_id, property_id, tenant_id, file_name, mime_type, \
     file_size, category, shared_with_tenant, storage_key, created_at, updated_at";

impl Database {
    /// Insert a row with an empty storage key. The row stays invisible to
    /// reads until [`Database::finalize_document`] records the key.
    pub async fn insert_placeholder_document(&self, new: &NewDocument) -> Result<Document> {
        let mut tx = self.pool.begin().await?;

        let document = sqlx::query_as::<_, Document>(&format!(
            r#"INSERT INTO documents (account_id, landlord_id, property_id, tenant_id, file_name, mime_type,
                   file_size, category, shared_with_tenant, storage_key)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '')
               RETURNING {}"#,
            DOCUMENT_COLUMNS
        ))
        .bind(new.account_id)
        .bind(new.landlord_id)
        .bind(new.property_id)
        .bind(new.tenant_id)
        .bind(&new.file_name)
        .bind(&new.mime_type)
        .bind(new.file_size)
        .bind(&new.category)
        .bind(new.shared_with_tenant)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(document)
    }

    pub async fn finalize_document(
        &self,
        id: Uuid,
        storage_key: &str,
        file_name: &str,
        mime_type: &str,
        file_size: i64,
    ) -> Result<Document> {
        let document = sqlx::query_as::<_, Document>(&format!(
            r#"UPDATE documents
               SET storage_key = $2, file_name = $3, mime_type = $4, file_size = $5, updated_at = NOW()
               WHERE id = $1
               RETURNING {}"#,
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .bind(storage_key)
        .bind(file_name)
        .bind(mime_type)
        .bind(file_size)
        .fetch_optional(&self.pool)
        .await?;

        document.ok_or_else(|| anyhow::anyhow!("Placeholder document {} disappeared before finalize", id))
    }

    /// Remove a placeholder row. Finalized rows are left untouched.
    pub async fn delete_placeholder_document(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND storage_key = ''")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_document_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        self.with_retry(|| async {
            let document = sqlx::query_as::<_, Document>(&format!(
                "SELECT {} FROM documents WHERE id = $1 AND storage_key <> ''",
                DOCUMENT_COLUMNS
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(document)
        })
        .await
    }

    /// Documents uploaded by an account, newest first, with property and
    /// tenant display fields joined in
    pub async fn list_documents_for_account(&self, account_id: Uuid) -> Result<Vec<DocumentWithRelations>> {
        self.with_retry(|| async {
            let rows = sqlx::query_as::<_, DocumentWithRelations>(
                r#"SELECT d.id, d.account_id, d.landlord_id, d.property_id, d.tenant_id, d.file_name,
                          d.mime_type, d.file_size, d.category, d.shared_with_tenant, d.storage_key,
                          d.created_at, d.updated_at,
                          p.name AS property_name, p.address AS property_address,
                          t.full_name AS tenant_name
                   FROM documents d
                   LEFT JOIN properties p ON p.id = d.property_id
                   LEFT JOIN tenants t ON t.id = d.tenant_id
                   WHERE d.account_id = $1 AND d.storage_key <> ''
                   ORDER BY d.created_at DESC"#,
            )
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows)
        })
        .await
    }

    /// Finalized rows, oldest first. `None` returns all of them.
    pub async fn list_finalized_documents(&self, limit: Option<i64>) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE storage_key <> '' ORDER BY created_at, id LIMIT $1",
            DOCUMENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Placeholder rows created before `cutoff`, left behind by uploads that
    /// never finished (process crash between insert and compensation)
    pub async fn find_stale_placeholders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE storage_key = '' AND created_at < $1 ORDER BY created_at",
            DOCUMENT_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn purge_stale_placeholders(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE storage_key = '' AND created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Lock a finalized document row for the rest of the transaction
pub async fn lock_document(conn: &mut PgConnection, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE id = $1 AND storage_key <> '' FOR UPDATE",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Write every mutable column of `document` in one statement
pub async fn update_document_row(conn: &mut PgConnection, document: &Document) -> Result<Document, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        r#"UPDATE documents
           SET landlord_id = $2, property_id = $3, tenant_id = $4, file_name = $5, category = $6,
               shared_with_tenant = $7, storage_key = $8, updated_at = NOW()
           WHERE id = $1
           RETURNING {}"#,
        DOCUMENT_COLUMNS
    ))
    .bind(document.id)
    .bind(document.landlord_id)
    .bind(document.property_id)
    .bind(document.tenant_id)
    .bind(&document.file_name)
    .bind(&document.category)
    .bind(document.shared_with_tenant)
    .bind(&document.storage_key)
    .fetch_one(conn)
    .await
}

pub async fn delete_document_row(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
