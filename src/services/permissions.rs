use uuid::Uuid;

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::Document,
};

/// Why a caller may act on a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Uploader,
    LandlordOwner,
    Denied,
}

impl Access {
    pub fn is_granted(self) -> bool {
        !matches!(self, Access::Denied)
    }
}

/// Pure access rule: the uploader, or the account owning the document's landlord
pub fn evaluate(account_id: Uuid, uploader_id: Uuid, landlord_owner: Option<Uuid>) -> Access {
    if account_id == uploader_id {
        Access::Uploader
    } else if landlord_owner == Some(account_id) {
        Access::LandlordOwner
    } else {
        Access::Denied
    }
}

#[derive(Clone)]
pub struct Gatekeeper {
    db: Database,
}

impl Gatekeeper {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn can_access(&self, account_id: Uuid, document: &Document) -> AppResult<bool> {
        Ok(self.check(account_id, document).await?.is_granted())
    }

    async fn check(&self, account_id: Uuid, document: &Document) -> AppResult<Access> {
        // The uploader never needs the ownership lookup
        if account_id == document.account_id {
            return Ok(Access::Uploader);
        }

        let landlord_owner = match document.landlord_id {
            Some(landlord_id) => self.db.get_landlord_owner(landlord_id).await?,
            None => None,
        };

        Ok(evaluate(account_id, document.account_id, landlord_owner))
    }

    /// Fail with `Forbidden` unless the caller may act on the document
    pub async fn authorize(&self, account_id: Uuid, document: &Document) -> AppResult<()> {
        if !self.can_access(account_id, document).await? {
            tracing::warn!(
                account_id = %account_id,
                document_id = %document.id,
                "access to document denied"
            );
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// Fail with `Forbidden` unless the caller owns the landlord record.
    /// An unknown landlord is treated the same as a foreign one.
    pub async fn authorize_landlord(&self, account_id: Uuid, landlord_id: Uuid) -> AppResult<()> {
        match self.db.get_landlord_owner(landlord_id).await? {
            Some(owner) if owner == account_id => Ok(()),
            _ => {
                tracing::warn!(account_id = %account_id, landlord_id = %landlord_id, "landlord ownership check failed");
                Err(AppError::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploader_is_granted() {
        let account = Uuid::new_v4();
        assert_eq!(evaluate(account, account, None), Access::Uploader);
        assert_eq!(evaluate(account, account, Some(Uuid::new_v4())), Access::Uploader);
    }

    #[test]
    fn test_landlord_owner_is_granted() {
        let owner = Uuid::new_v4();
        let uploader = Uuid::new_v4();
        assert_eq!(evaluate(owner, uploader, Some(owner)), Access::LandlordOwner);
    }

    #[test]
    fn test_stranger_is_denied() {
        let stranger = Uuid::new_v4();
        let uploader = Uuid::new_v4();
        assert_eq!(evaluate(stranger, uploader, None), Access::Denied);
        assert_eq!(evaluate(stranger, uploader, Some(Uuid::new_v4())), Access::Denied);
        assert!(!Access::Denied.is_granted());
    }
}
