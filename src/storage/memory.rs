use crate::models::{Modality, StoredTemplate};
use crate::storage::TemplateStore;
use crate::utils::{BiometricError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    records: RwLock<HashMap<(String, Modality), StoredTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned() -> BiometricError {
    BiometricError::StorageError("template store lock poisoned".to_string())
}

impl TemplateStore for MemoryTemplateStore {
    fn get_template(&self, owner: &str, modality: Modality) -> Result<Option<StoredTemplate>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(&(owner.to_string(), modality)).cloned())
    }

    fn put_template(&self, owner: &str, modality: Modality, record: StoredTemplate) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert((owner.to_string(), modality), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EncryptedTemplate;

    fn record(blob: &str) -> StoredTemplate {
        StoredTemplate {
            template: EncryptedTemplate::new(blob.to_string()),
            enabled: true,
            enrolled_at: "2024-01-01T00:00:00+00:00".to_string(),
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_keys_are_owner_and_modality() {
        let store = MemoryTemplateStore::new();
        assert!(store.is_empty().unwrap());
        store.put_template("alice", Modality::Face, record("a")).unwrap();
        store.put_template("alice", Modality::Voice, record("b")).unwrap();
        store.put_template("alice", Modality::Face, record("c")).unwrap();

        assert_eq!(store.len().unwrap(), 2);
        let face = store.get_template("alice", Modality::Face).unwrap().unwrap();
        assert_eq!(face.template.as_str(), "c");
        assert!(store.get_template("bob", Modality::Face).unwrap().is_none());
        assert!(store.get_template("alice", Modality::Fingerprint).unwrap().is_none());
    }

    #[test]
    fn test_poisoned_lock_is_storage_error() {
        let store = MemoryTemplateStore::new();
        store.put_template("alice", Modality::Face, record("a")).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.records.write().unwrap();
            panic!("writer died holding the lock");
        }));
        assert!(result.is_err());

        assert!(matches!(store.len(), Err(BiometricError::StorageError(_))));
        assert!(matches!(store.is_empty(), Err(BiometricError::StorageError(_))));
        assert!(matches!(
            store.get_template("alice", Modality::Face),
            Err(BiometricError::StorageError(_))
        ));
        assert!(matches!(
            store.put_template("bob", Modality::Face, record("b")),
            Err(BiometricError::StorageError(_))
        ));
    }
}
