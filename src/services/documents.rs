//! Document lifecycle: upload, list, download, delete, rename and update.
//!
//! Every operation that touches both the metadata row and the blob follows
//! one rule: a finalized row always points at an object that exists. Uploads
//! and moves are sagas with compensating actions; rename, update and delete
//! hold a `FOR UPDATE` lock on the row for the whole sequence so concurrent
//! requests on the same document serialize.

use futures::future::join_all;
use sqlx::{Postgres, Transaction};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::{
        documents::{delete_document_row, lock_document, update_document_row},
        Database,
    },
    errors::{AppError, AppResult},
    models::{
        Document, DocumentListItem, NewDocument, RenameDocumentRequest, UpdateDocumentRequest,
        UploadDocumentRequest,
    },
    services::{permissions::Gatekeeper, saga::Saga, signed_url::SignedUrlIssuer},
    storage::{paths::build_storage_key, BlobStore, Overwrite},
    utils::security::{sanitize_filename, validate_display_name},
};

#[derive(Clone)]
pub struct DocumentService {
    db: Database,
    blob_store: Arc<dyn BlobStore>,
    gatekeeper: Gatekeeper,
    urls: SignedUrlIssuer,
}

impl DocumentService {
    pub fn new(db: Database, blob_store: Arc<dyn BlobStore>, signed_url_ttl: Duration) -> Self {
        Self {
            gatekeeper: Gatekeeper::new(db.clone()),
            urls: SignedUrlIssuer::new(blob_store.clone(), signed_url_ttl),
            db,
            blob_store,
        }
    }

    pub async fn upload(&self, account_id: Uuid, request: UploadDocumentRequest) -> AppResult<Document> {
        if request.data.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }

        let file_name = match request.custom_name.as_deref().map(str::trim) {
            Some(custom) if !custom.is_empty() => {
                validate_display_name(custom).map_err(|e| AppError::validation(e.to_string()))?
            }
            _ => validate_display_name(&request.original_name)
                .unwrap_or_else(|_| sanitize_filename(&request.original_name)),
        };

        let landlord_id = self
            .resolve_landlord(request.landlord_id, request.property_id)
            .await?;

        if let Some(landlord_id) = landlord_id {
            self.gatekeeper.authorize_landlord(account_id, landlord_id).await?;
        }
        if let Some(tenant_id) = request.tenant_id {
            self.check_tenant(account_id, tenant_id, request.property_id, landlord_id)
                .await?;
        }

        let file_size = request.data.len() as i64;
        let placeholder = self
            .db
            .insert_placeholder_document(&NewDocument {
                account_id,
                landlord_id,
                property_id: request.property_id,
                tenant_id: request.tenant_id,
                file_name: file_name.clone(),
                mime_type: request.mime_type.clone(),
                file_size,
                category: normalize_category(request.category),
                shared_with_tenant: request.shared_with_tenant,
            })
            .await?;
        let document_id = placeholder.id;

        let mut saga = Saga::new("upload_document");
        {
            let db = self.db.clone();
            saga.compensate_with("insert_placeholder", move || async move {
                db.delete_placeholder_document(document_id).await.map(|_| ())
            });
        }

        let storage_key = build_storage_key(landlord_id, request.property_id, document_id, &file_name);
        if let Err(e) = self
            .blob_store
            .put(&storage_key, &request.data, &request.mime_type, Overwrite::Forbid)
            .await
        {
            error!(
                document_id = %document_id,
                storage_key = %storage_key,
                backend = self.blob_store.backend_name(),
                "Upload to blob store failed, removing placeholder row: {:#}",
                e
            );
            saga.fail().await;
            return Err(AppError::storage(e));
        }
        {
            let blob_store = self.blob_store.clone();
            let key = storage_key.clone();
            saga.compensate_with("put_object", move || async move { blob_store.delete(&key).await });
        }

        let document = match self
            .db
            .finalize_document(document_id, &storage_key, &file_name, &request.mime_type, file_size)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                error!(document_id = %document_id, "Failed to finalize document row: {:#}", e);
                saga.fail().await;
                return Err(AppError::Internal(e));
            }
        };
        saga.complete();

        info!(
            document_id = %document.id,
            storage_key = %document.storage_key,
            size = file_size,
            "Document uploaded"
        );
        Ok(document)
    }

    /// The caller's own uploads with a usable URL for each
    pub async fn list(&self, account_id: Uuid) -> AppResult<Vec<DocumentListItem>> {
        let rows = self.db.list_documents_for_account(account_id).await?;

        let items = join_all(rows.into_iter().map(|row| async move {
            let file_url = self.urls.issue(&row.document.storage_key).await;
            DocumentListItem {
                document: row.document,
                property_name: row.property_name,
                property_address: row.property_address,
                tenant_name: row.tenant_name,
                file_url,
            }
        }))
        .await;

        Ok(items)
    }

    pub async fn download_url(&self, account_id: Uuid, document_id: Uuid) -> AppResult<String> {
        let document = self
            .db
            .get_document_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::not_found("Document"))?;

        self.gatekeeper.authorize(account_id, &document).await?;
        Ok(self.urls.issue(&document.storage_key).await)
    }

    /// Remove the object (best-effort) and then the row
    pub async fn delete(&self, account_id: Uuid, document_id: Uuid) -> AppResult<Uuid> {
        let mut tx = self.db.begin().await?;
        let document = self.lock_authorized(&mut tx, account_id, document_id).await?;

        if let Err(e) = self.blob_store.delete(&document.storage_key).await {
            warn!(
                document_id = %document_id,
                storage_key = %document.storage_key,
                "Failed to delete stored object, removing row anyway: {:#}",
                e
            );
        }

        delete_document_row(&mut *tx, document_id).await?;
        tx.commit().await?;

        info!(document_id = %document_id, "Document deleted");
        Ok(document_id)
    }

    pub async fn rename(
        &self,
        account_id: Uuid,
        document_id: Uuid,
        request: RenameDocumentRequest,
    ) -> AppResult<(Document, String)> {
        let new_name = validate_display_name(&request.new_name).map_err(|e| AppError::validation(e.to_string()))?;

        let mut tx = self.db.begin().await?;
        let current = self.lock_authorized(&mut tx, account_id, document_id).await?;

        let mut target = current.clone();
        target.file_name = new_name;

        let document = self.apply_changes(tx, current, target, request.move_storage).await?;
        let file_url = self.urls.issue(&document.storage_key).await;

        info!(document_id = %document_id, file_name = %document.file_name, "Document renamed");
        Ok((document, file_url))
    }

    pub async fn update(
        &self,
        account_id: Uuid,
        document_id: Uuid,
        request: UpdateDocumentRequest,
    ) -> AppResult<Document> {
        let mut tx = self.db.begin().await?;
        let current = self.lock_authorized(&mut tx, account_id, document_id).await?;

        let mut target = current.clone();
        if let Some(category) = request.category {
            target.category = normalize_category(Some(category));
        }
        if let Some(shared) = request.shared_with_tenant {
            target.shared_with_tenant = shared;
        }
        match request.property_id {
            Some(Some(property_id)) => {
                let landlord_id = self
                    .db
                    .get_property_landlord(property_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Property"))?;
                self.gatekeeper.authorize_landlord(account_id, landlord_id).await?;

                target.property_id = Some(property_id);
                target.landlord_id = Some(landlord_id);
            }
            Some(None) => target.property_id = None,
            None => {}
        }

        let document = self.apply_changes(tx, current, target, request.move_storage).await?;
        info!(document_id = %document_id, "Document updated");
        Ok(document)
    }

    /// Landlord for a new upload. A property determines its landlord; an
    /// explicit landlord must agree with it.
    async fn resolve_landlord(&self, landlord_id: Option<Uuid>, property_id: Option<Uuid>) -> AppResult<Option<Uuid>> {
        let Some(property_id) = property_id else {
            return Ok(landlord_id);
        };

        let property_landlord = self
            .db
            .get_property_landlord(property_id)
            .await?
            .ok_or_else(|| AppError::not_found("Property"))?;

        match landlord_id {
            Some(given) if given != property_landlord => Err(AppError::validation(
                "Property does not belong to the given landlord",
            )),
            _ => Ok(Some(property_landlord)),
        }
    }

    /// A referenced tenant must exist, live under the document's property and
    /// landlord, and belong to a landlord the caller owns
    async fn check_tenant(
        &self,
        account_id: Uuid,
        tenant_id: Uuid,
        property_id: Option<Uuid>,
        landlord_id: Option<Uuid>,
    ) -> AppResult<()> {
        let owner = self
            .db
            .get_tenant_owner(tenant_id)
            .await?
            .ok_or_else(|| AppError::not_found("Tenant"))?;

        if property_id.is_some() && owner.property_id != property_id {
            return Err(AppError::validation("Tenant does not belong to the given property"));
        }
        if landlord_id.is_some() && owner.landlord_id != landlord_id {
            return Err(AppError::validation("Tenant does not belong to the given landlord"));
        }

        match owner.landlord_id {
            Some(tenant_landlord) => self.gatekeeper.authorize_landlord(account_id, tenant_landlord).await,
            None => {
                warn!(account_id = %account_id, tenant_id = %tenant_id, "tenant has no landlord to check ownership against");
                Err(AppError::Forbidden)
            }
        }
    }

    async fn lock_authorized(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: Uuid,
        document_id: Uuid,
    ) -> AppResult<Document> {
        let document = lock_document(&mut **tx, document_id)
            .await?
            .ok_or_else(|| AppError::not_found("Document"))?;

        self.gatekeeper.authorize(account_id, &document).await?;
        Ok(document)
    }

    /// Persist `target` and, when requested and the key changes, relocate the
    /// object. The new object is written before the row changes and the old
    /// one is removed only after commit.
    async fn apply_changes(
        &self,
        mut tx: Transaction<'static, Postgres>,
        current: Document,
        mut target: Document,
        move_storage: bool,
    ) -> AppResult<Document> {
        let new_key = if move_storage {
            let key = build_storage_key(target.landlord_id, target.property_id, target.id, &target.file_name);
            (key != current.storage_key).then_some(key)
        } else {
            None
        };

        let Some(new_key) = new_key else {
            let updated = update_document_row(&mut *tx, &target).await?;
            tx.commit().await?;
            return Ok(updated);
        };

        let document_id = current.id;
        let old_key = current.storage_key;
        info!(document_id = %document_id, from = %old_key, to = %new_key, "Moving stored object");

        let data = self.blob_store.get(&old_key).await.map_err(|e| {
            error!(document_id = %document_id, storage_key = %old_key, "Failed to read object for move: {:#}", e);
            AppError::storage(e)
        })?;

        self.blob_store
            .put(&new_key, &data, &current.mime_type, Overwrite::Forbid)
            .await
            .map_err(|e| {
                error!(document_id = %document_id, storage_key = %new_key, "Failed to write moved object: {:#}", e);
                AppError::storage(e)
            })?;

        let mut saga = Saga::new("move_document");
        {
            let blob_store = self.blob_store.clone();
            let key = new_key.clone();
            saga.compensate_with("copy_object", move || async move { blob_store.delete(&key).await });
        }

        target.storage_key = new_key;
        let updated = match update_document_row(&mut *tx, &target).await {
            Ok(updated) => updated,
            Err(e) => {
                error!(document_id = %document_id, "Failed to update row after copy: {}", e);
                drop(tx);
                saga.fail().await;
                return Err(e.into());
            }
        };
        let updated = match tx.commit().await {
            Ok(()) => updated,
            Err(e) => {
                error!(document_id = %document_id, "Failed to commit move: {}", e);
                // The commit may have landed with only the acknowledgement lost
                let reread = self.db.get_document_by_id(document_id).await;
                match check_unacknowledged_commit(&reread, &target.storage_key) {
                    CommitCheck::Landed => {
                        warn!(document_id = %document_id, "Move commit was unacknowledged but the row holds the new key");
                        reread.ok().flatten().unwrap_or(updated)
                    }
                    CommitCheck::RolledBack => {
                        saga.fail().await;
                        return Err(e.into());
                    }
                    CommitCheck::Unknown => {
                        warn!(
                            document_id = %document_id,
                            storage_key = %target.storage_key,
                            "Could not confirm move commit, keeping copied object"
                        );
                        saga.complete();
                        return Err(e.into());
                    }
                }
            }
        };
        saga.complete();

        if let Err(e) = self.blob_store.delete(&old_key).await {
            warn!(
                document_id = %document_id,
                storage_key = %old_key,
                "Moved document but failed to delete old object: {:#}",
                e
            );
        }

        Ok(updated)
    }
}

/// Outcome of a commit whose acknowledgement failed, judged by re-reading the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitCheck {
    Landed,
    RolledBack,
    Unknown,
}

fn check_unacknowledged_commit(reread: &anyhow::Result<Option<Document>>, new_key: &str) -> CommitCheck {
    match reread {
        Ok(Some(row)) if row.storage_key == new_key => CommitCheck::Landed,
        Ok(_) => CommitCheck::RolledBack,
        Err(_) => CommitCheck::Unknown,
    }
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
