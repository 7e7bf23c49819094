//! # In-Memory Key Store
//!
//! Ordered in-memory backend. Versions are told apart by key suffix, so it
//! serves the standard key strategy.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::backend::{list_sub_keys, plan_removal, FolderEntry, KeyStore, KeyVisitor};
use super::errors::{KeyStoreError, KeyStoreResult};
use crate::index::{IndexHandler, IndexProducer, MemoryIndexHandler};

/// In-memory key store for testing and embedded use
#[derive(Debug)]
pub struct MemKeyStore {
    id: String,
    entries: RwLock<BTreeMap<String, String>>,
}

impl Default for MemKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemKeyStore {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> KeyStoreResult<RwLockReadGuard<'_, BTreeMap<String, String>>> {
        self.entries.read().map_err(|_| KeyStoreError::LockPoisoned)
    }

    fn write(&self) -> KeyStoreResult<RwLockWriteGuard<'_, BTreeMap<String, String>>> {
        self.entries.write().map_err(|_| KeyStoreError::LockPoisoned)
    }
}

impl KeyStore for MemKeyStore {
    fn store_id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> KeyStoreResult<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: &str, content: &str) -> KeyStoreResult<()> {
        self.write()?.insert(key.to_string(), content.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> KeyStoreResult<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn delete_keys(&self, keys: &[String]) -> KeyStoreResult<bool> {
        let mut entries = self.write()?;
        let mut removed = false;
        for key in keys {
            removed |= entries.remove(key).is_some();
        }
        Ok(removed)
    }

    fn get_batch(&self, keys: &[String]) -> KeyStoreResult<Vec<Option<String>>> {
        let entries = self.read()?;
        Ok(keys.iter().map(|key| entries.get(key).cloned()).collect())
    }

    fn contains_key(&self, key: &str) -> KeyStoreResult<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn get_sub_keys(&self, prefix: &str) -> KeyStoreResult<Vec<FolderEntry>> {
        let entries = self.read()?;
        Ok(list_sub_keys(entries.keys().map(String::as_str), prefix))
    }

    fn get_all_sub_keys(&self, prefix: &str) -> KeyStoreResult<Vec<String>> {
        let entries = self.read()?;
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix) && key.len() > prefix.len())
            .cloned()
            .collect())
    }

    fn remove_sub_keys(&self, folder: &str, force: bool) -> KeyStoreResult<Vec<FolderEntry>> {
        let mut entries = self.write()?;
        let plan = plan_removal(entries.keys().map(String::as_str), folder, force);
        for entry in plan.iter().filter(|entry| !entry.is_folder) {
            entries.remove(&entry.name);
        }
        Ok(plan)
    }

    fn visit_keys(&self, prefix: &str, visitor: &mut KeyVisitor<'_>) -> KeyStoreResult<()> {
        // Snapshot first so the visitor may call back into this store.
        let snapshot: Vec<(String, String)> = self
            .read()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &snapshot {
            if !visitor(key, value) {
                break;
            }
        }
        Ok(())
    }

    fn visit_keys_from_start(
        &self,
        start: Option<&str>,
        visitor: &mut KeyVisitor<'_>,
    ) -> KeyStoreResult<()> {
        let lower = match start {
            Some(start) => Bound::Excluded(start.to_string()),
            None => Bound::Unbounded,
        };
        let snapshot: Vec<(String, String)> = self
            .read()?
            .range((lower, Bound::Unbounded))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &snapshot {
            if !visitor(key, value) {
                break;
            }
        }
        Ok(())
    }

    fn count_keys(&self) -> KeyStoreResult<u64> {
        Ok(self.read()?.len() as u64)
    }

    fn size(&self) -> Option<u64> {
        let entries = self.read().ok()?;
        Some(
            entries
                .iter()
                .map(|(key, value)| (key.len() + value.len()) as u64)
                .sum(),
        )
    }

    fn drop_key_store(&self) -> KeyStoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn create_related_key_store(&self, _relation: &str) -> Arc<dyn KeyStore> {
        Arc::new(MemKeyStore::new())
    }

    fn create_index_handler(&self, producer: Arc<dyn IndexProducer>) -> Option<Arc<dyn IndexHandler>> {
        Some(Arc::new(MemoryIndexHandler::new(producer)))
    }
}
