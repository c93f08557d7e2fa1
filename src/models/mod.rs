// Re-export all model types for ease of use

pub mod document;
pub mod ledger;

pub use document::*;
pub use ledger::*;
