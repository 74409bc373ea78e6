use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{KeyValueStorage, StorageError};

/// In-process storage. Lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").unwrap();
        storage.set("a", "2").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.list_keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let storage = MemoryStorage::new();
        storage.remove("missing").unwrap();
        assert!(storage.list_keys().unwrap().is_empty());
    }

    #[test]
    fn test_list_keys_sorted() {
        let storage = MemoryStorage::new();
        storage.set("b", "").unwrap();
        storage.set("a", "").unwrap();
        assert_eq!(storage.list_keys().unwrap(), vec!["a", "b"]);
    }
}
