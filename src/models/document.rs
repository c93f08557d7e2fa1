use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Metadata row describing one stored file
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Document {
    pub id: Uuid,
    /// Account that uploaded the file
    pub account_id: Uuid,
    pub landlord_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    /// Display name
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub category: Option<String>,
    pub shared_with_tenant: bool,
    /// Location of the object in the blob store
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document row joined with the property and tenant display fields
#[derive(Debug, Clone, FromRow)]
pub struct DocumentWithRelations {
    #[sqlx(flatten)]
    pub document: Document,
    pub property_name: Option<String>,
    pub property_address: Option<String>,
    pub tenant_name: Option<String>,
}

/// Fields collected from the multipart upload form
#[derive(Debug, Default)]
pub struct UploadDocumentRequest {
    pub original_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub landlord_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub category: Option<String>,
    pub shared_with_tenant: bool,
    pub custom_name: Option<String>,
}

/// Values for the placeholder row written before the blob upload
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub account_id: Uuid,
    pub landlord_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub category: Option<String>,
    pub shared_with_tenant: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RenameDocumentRequest {
    pub new_name: String,
    /// Relocate the stored object so its key follows the new name
    #[serde(default)]
    pub move_storage: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDocumentRequest {
    pub category: Option<String>,
    pub shared_with_tenant: Option<bool>,
    /// Absent leaves the property unchanged, `null` detaches it
    #[serde(default, deserialize_with = "deserialize_present_nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub property_id: Option<Option<Uuid>>,
    /// Relocate the stored object when the property changes
    #[serde(default)]
    pub move_storage: bool,
}

/// Distinguishes a missing field (`None`) from an explicit `null` (`Some(None)`)
fn deserialize_present_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentListItem {
    #[serde(flatten)]
    pub document: Document,
    pub property_name: Option<String>,
    pub property_address: Option<String>,
    pub tenant_name: Option<String>,
    /// Signed URL when the backend can sign, public URL otherwise
    pub file_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadDocumentResponse {
    pub success: bool,
    pub document: Document,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentListItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignedUrlResponse {
    pub success: bool,
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteDocumentResponse {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenameDocumentResponse {
    pub success: bool,
    pub id: Uuid,
    pub file_name: String,
    pub file_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateDocumentResponse {
    pub success: bool,
    pub document: Document,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_property_presence() {
        let absent: UpdateDocumentRequest = serde_json::from_str(r#"{"category":"Lease"}"#).unwrap();
        assert_eq!(absent.property_id, None);
        assert!(!absent.move_storage);

        let cleared: UpdateDocumentRequest = serde_json::from_str(r#"{"property_id":null}"#).unwrap();
        assert_eq!(cleared.property_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateDocumentRequest =
            serde_json::from_str(&format!(r#"{{"property_id":"{}","move_storage":true}}"#, id)).unwrap();
        assert_eq!(set.property_id, Some(Some(id)));
        assert!(set.move_storage);
    }

    #[test]
    fn test_update_request_rejects_malformed_property() {
        let result: Result<UpdateDocumentRequest, _> = serde_json::from_str(r#"{"property_id":"not-a-uuid"}"#);
        assert!(result.is_err());

        let result: Result<UpdateDocumentRequest, _> = serde_json::from_str(r#"{"landlord":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_signed_url_response_field_name() {
        let response = SignedUrlResponse {
            success: true,
            signed_url: "https://example.com/a".to_string(),
        };
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["signedUrl"], "https://example.com/a");
    }
}
