use crate::models::{Modality, StoredTemplate};
use crate::storage::TemplateStore;
use crate::utils::{BiometricError, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One JSON record per (owner, modality) under a root directory.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a concurrent reader sees either the old or the new record.
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    root: PathBuf,
}

impl FileTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileTemplateStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Owner ids are hex-encoded so they can never escape the root
    fn record_path(&self, owner: &str, modality: Modality) -> PathBuf {
        self.root
            .join(format!("{}.{}.json", hex::encode(owner.as_bytes()), modality))
    }
}

impl TemplateStore for FileTemplateStore {
    fn get_template(&self, owner: &str, modality: Modality) -> Result<Option<StoredTemplate>> {
        let path = self.record_path(owner, modality);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BiometricError::StorageError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            BiometricError::StorageError(format!("Corrupt record {}: {}", path.display(), e))
        })
    }

    fn put_template(&self, owner: &str, modality: Modality, record: StoredTemplate) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            BiometricError::StorageError(format!(
                "Failed to create {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| BiometricError::StorageError(format!("Failed to encode record: {}", e)))?;
        let mut temp_file = NamedTempFile::new_in(&self.root)
            .map_err(|e| BiometricError::StorageError(format!("Failed to create temp file: {}", e)))?;
        temp_file
            .write_all(&json)
            .and_then(|_| temp_file.as_file().sync_all())
            .map_err(|e| BiometricError::StorageError(format!("Failed to write record: {}", e)))?;

        let path = self.record_path(owner, modality);
        temp_file.persist(&path).map_err(|e| {
            BiometricError::StorageError(format!("Failed to persist {}: {}", path.display(), e.error))
        })?;
        log::debug!("Stored {} template record at {}", modality, path.display());
        Ok(())
    }
}
