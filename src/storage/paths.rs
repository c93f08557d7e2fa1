//! Canonical storage key construction for document objects

use uuid::Uuid;

use crate::utils::security::sanitize_filename;

/// Root prefix for every document object in the blob store
pub const DOCUMENTS_PREFIX: &str = "documents";

/// Build the storage key for a document.
///
/// Layout: `documents/landlord_{id|none}/property_{id|none}/document_{id}-{filename}`.
/// The key depends only on its arguments, so recomputing it after a rename or a
/// property reassignment yields the relocation target.
pub fn build_storage_key(
    landlord_id: Option<Uuid>,
    property_id: Option<Uuid>,
    document_id: Uuid,
    filename: &str,
) -> String {
    format!(
        "{}/landlord_{}/property_{}/document_{}-{}",
        DOCUMENTS_PREFIX,
        segment(landlord_id),
        segment(property_id),
        document_id,
        sanitize_filename(filename),
    )
}

fn segment(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_storage_key_is_deterministic() {
        let landlord = Uuid::new_v4();
        let property = Uuid::new_v4();
        let document = Uuid::new_v4();

        let first = build_storage_key(Some(landlord), Some(property), document, "My File.pdf");
        let second = build_storage_key(Some(landlord), Some(property), document, "My File.pdf");

        assert_eq!(first, second);
        assert_eq!(
            first,
            format!(
                "documents/landlord_{}/property_{}/document_{}-My_File.pdf",
                landlord, property, document
            )
        );
    }

    #[test]
    fn test_build_storage_key_missing_owners() {
        let document = Uuid::new_v4();
        let key = build_storage_key(None, None, document, "lease.pdf");
        assert_eq!(
            key,
            format!("documents/landlord_none/property_none/document_{}-lease.pdf", document)
        );
    }

    #[test]
    fn test_build_storage_key_rejects_hostile_filenames() {
        let document = Uuid::new_v4();
        let hostile = [
            "../../../etc/passwd",
            "a/b/c.pdf",
            "..",
            "rent 🏠.pdf",
            "\u{0}\u{1b}[31mred.png",
        ];

        for name in hostile {
            let key = build_storage_key(None, None, document, name);
            let filename_segment = key.rsplit('/').next().unwrap();

            // Only the layout separators may appear
            assert_eq!(key.matches('/').count(), 3, "unexpected separator for {:?}: {}", name, key);
            assert!(!key.contains(".."), "traversal survived for {:?}: {}", name, key);
            assert!(key.is_ascii(), "non-ascii survived for {:?}: {}", name, key);
            assert!(filename_segment.starts_with(&format!("document_{}-", document)));
        }
    }

    #[test]
    fn test_build_storage_key_changes_with_owner() {
        let document = Uuid::new_v4();
        let before = build_storage_key(Some(Uuid::new_v4()), Some(Uuid::new_v4()), document, "a.pdf");
        let after = build_storage_key(Some(Uuid::new_v4()), Some(Uuid::new_v4()), document, "a.pdf");
        assert_ne!(before, after);
    }
}
