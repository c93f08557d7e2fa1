pub mod documents;
pub mod expense_extraction;
pub mod permissions;
pub mod saga;
pub mod signed_url;
