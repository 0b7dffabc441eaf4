#![forbid(unsafe_code)]

pub mod audit;
pub mod credentials;
pub mod error;
pub mod paths;
pub mod reconciler;
pub mod thumbs;

pub use audit::{AuditEntry, AuditLog};
pub use credentials::AdminCredentials;
pub use error::CatalogError;
pub use paths::ProductPath;
pub use reconciler::{CatalogTree, RenameOutcome, RenameRequest, StoredProduct};
