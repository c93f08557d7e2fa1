use anyhow::Result;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::Database;

#[derive(Debug, Clone, Copy, FromRow)]
pub struct TenantOwner {
    pub property_id: Option<Uuid>,
    pub landlord_id: Option<Uuid>,
}

impl Database {
    /// Account that owns a landlord record, `None` when the landlord is unknown
    pub async fn get_landlord_owner(&self, landlord_id: Uuid) -> Result<Option<Uuid>> {
        self.with_retry(|| async {
            let row = sqlx::query("SELECT account_id FROM landlords WHERE id = $1")
                .bind(landlord_id)
                .fetch_optional(&self.pool)
                .await?;

            Ok(row.map(|row| row.get("account_id")))
        })
        .await
    }

    /// Landlord of a property. Outer `None` means the property does not exist.
    pub async fn get_property_landlord(&self, property_id: Uuid) -> Result<Option<Uuid>> {
        self.with_retry(|| async {
            let row = sqlx::query("SELECT landlord_id FROM properties WHERE id = $1")
                .bind(property_id)
                .fetch_optional(&self.pool)
                .await?;

            Ok(row.map(|row| row.get("landlord_id")))
        })
        .await
    }

    /// Property and landlord a tenant lives under. Outer `None` means the
    /// tenant does not exist; both ids are `None` for an unhoused tenant.
    pub async fn get_tenant_owner(&self, tenant_id: Uuid) -> Result<Option<TenantOwner>> {
        self.with_retry(|| async {
            let owner = sqlx::query_as::<_, TenantOwner>(
                r#"SELECT t.property_id, p.landlord_id
                   FROM tenants t
                   LEFT JOIN properties p ON p.id = t.property_id
                   WHERE t.id = $1"#,
            )
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(owner)
        })
        .await
    }

    /// Landlord profile of an account (the oldest one if several exist)
    pub async fn get_landlord_for_account(&self, account_id: Uuid) -> Result<Option<Uuid>> {
        self.with_retry(|| async {
            let row = sqlx::query(
                "SELECT id FROM landlords WHERE account_id = $1 ORDER BY created_at, id LIMIT 1",
            )
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(|row| row.get("id")))
        })
        .await
    }
}
