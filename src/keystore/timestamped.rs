//! # In-Memory Timestamped Key Store
//!
//! Every key holds a series of cells ordered by write timestamp, the way
//! column-family stores keep per-cell versions. A time-scoped read returns
//! the newest cell written at or before the requested instant.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use uuid::Uuid;

use super::backend::{list_sub_keys, plan_removal, FolderEntry, KeyStore, KeyVisitor};
use super::errors::{KeyStoreError, KeyStoreResult};
use crate::index::{IndexHandler, IndexProducer, MemoryIndexHandler};

type Cells = BTreeMap<i64, String>;

/// In-memory key store with native per-cell timestamps
#[derive(Debug)]
pub struct MemTimestampKeyStore {
    id: String,
    entries: RwLock<BTreeMap<String, Cells>>,
}

impl Default for MemTimestampKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemTimestampKeyStore {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> KeyStoreResult<RwLockReadGuard<'_, BTreeMap<String, Cells>>> {
        self.entries.read().map_err(|_| KeyStoreError::LockPoisoned)
    }

    fn write(&self) -> KeyStoreResult<RwLockWriteGuard<'_, BTreeMap<String, Cells>>> {
        self.entries.write().map_err(|_| KeyStoreError::LockPoisoned)
    }

    /// Number of timestamped cells held for a key
    pub fn cell_count(&self, key: &str) -> KeyStoreResult<usize> {
        Ok(self.read()?.get(key).map_or(0, BTreeMap::len))
    }

    fn latest(cells: &Cells) -> Option<&String> {
        cells.values().next_back()
    }
}

impl KeyStore for MemTimestampKeyStore {
    fn store_id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> KeyStoreResult<Option<String>> {
        Ok(self.read()?.get(key).and_then(Self::latest).cloned())
    }

    fn get_at(&self, key: &str, timestamp: i64) -> KeyStoreResult<Option<String>> {
        let entries = self.read()?;
        Ok(entries
            .get(key)
            .and_then(|cells| cells.range(..=timestamp).next_back())
            .map(|(_, value)| value.clone()))
    }

    fn put(&self, key: &str, content: &str) -> KeyStoreResult<()> {
        let mut entries = self.write()?;
        let cells = entries.entry(key.to_string()).or_default();
        // An untimed write must land after every existing cell.
        let now = Utc::now().timestamp_millis();
        let timestamp = match cells.keys().next_back() {
            Some(last) if *last >= now => last + 1,
            _ => now,
        };
        cells.insert(timestamp, content.to_string());
        Ok(())
    }

    fn put_at(&self, key: &str, timestamp: i64, content: &str) -> KeyStoreResult<()> {
        self.write()?
            .entry(key.to_string())
            .or_default()
            .insert(timestamp, content.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> KeyStoreResult<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn delete_up_to(&self, key: &str, cutoff_millis: i64) -> KeyStoreResult<bool> {
        let mut entries = self.write()?;
        let Some(cells) = entries.get_mut(key) else {
            return Ok(false);
        };
        let before = cells.len();
        cells.retain(|timestamp, _| *timestamp > cutoff_millis);
        let removed = cells.len() != before;
        if cells.is_empty() {
            entries.remove(key);
        }
        Ok(removed)
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
        let snapshot: Vec<(String, String)> = self
            .read()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, cells)| Self::latest(cells).map(|value| (key.clone(), value.clone())))
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
            .filter_map(|(key, cells)| Self::latest(cells).map(|value| (key.clone(), value.clone())))
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
                .map(|(key, cells)| {
                    cells
                        .values()
                        .map(|value| (key.len() + value.len() + 8) as u64)
                        .sum::<u64>()
                })
                .sum(),
        )
    }

    fn drop_key_store(&self) -> KeyStoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn supports_version_lookup_by_time(&self) -> bool {
        true
    }

    fn create_related_key_store(&self, _relation: &str) -> Arc<dyn KeyStore> {
        Arc::new(MemTimestampKeyStore::new())
    }

    fn create_index_handler(&self, producer: Arc<dyn IndexProducer>) -> Option<Arc<dyn IndexHandler>> {
        Some(Arc::new(MemoryIndexHandler::new(producer)))
    }
}
