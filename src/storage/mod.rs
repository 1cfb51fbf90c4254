//! Persistence and credential collaborators of the template manager.

pub mod credential;
pub mod file;
pub mod memory;

pub use credential::StaticCredentialIssuer;
pub use file::FileTemplateStore;
pub use memory::MemoryTemplateStore;

use crate::models::{Modality, StoredTemplate};
use crate::utils::Result;

/// Keyed by (owner, modality). A single record is read and written atomically.
pub trait TemplateStore: Send + Sync {
    fn get_template(&self, owner: &str, modality: Modality) -> Result<Option<StoredTemplate>>;

    fn put_template(&self, owner: &str, modality: Modality, record: StoredTemplate) -> Result<()>;
}

/// Mints the upgraded credential handed out after a successful verification.
pub trait CredentialIssuer: Send + Sync {
    fn issue_verified_credential(&self, owner: &str, modality: Modality) -> Result<String>;
}
