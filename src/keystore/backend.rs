//! # Key Store Trait
//!
//! The ordered key-value contract every document backend implements. The
//! meta handlers only ever talk to storage through this trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{KeyStoreError, KeyStoreResult};
use crate::index::{IndexHandler, IndexProducer};

/// Callback handed every visited `(key, content)` pair. Returning `false`
/// stops the walk.
pub type KeyVisitor<'a> = dyn FnMut(&str, &str) -> bool + 'a;

/// One entry of a folder listing over a flat keyspace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    pub is_folder: bool,
}

impl FolderEntry {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: true,
        }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: false,
        }
    }
}

/// Backend trait for document, version, meta and attribute storage
pub trait KeyStore: Send + Sync + std::fmt::Debug {
    /// Unique id of this store instance
    fn store_id(&self) -> &str;

    /// Read the current content of a key
    fn get(&self, key: &str) -> KeyStoreResult<Option<String>>;

    /// Read the content a key held at `timestamp` (epoch millis)
    fn get_at(&self, _key: &str, _timestamp: i64) -> KeyStoreResult<Option<String>> {
        Err(KeyStoreError::not_supported("get_at"))
    }

    /// Write content to a key
    fn put(&self, key: &str, content: &str) -> KeyStoreResult<()>;

    /// Write content to a key at an explicit timestamp (epoch millis)
    fn put_at(&self, _key: &str, _timestamp: i64, _content: &str) -> KeyStoreResult<()> {
        Err(KeyStoreError::not_supported("put_at"))
    }

    /// Delete a key, returning whether it existed
    fn delete(&self, key: &str) -> KeyStoreResult<bool>;

    /// Delete many keys, returning whether any existed
    fn delete_keys(&self, keys: &[String]) -> KeyStoreResult<bool> {
        let mut removed = false;
        for key in keys {
            removed |= self.delete(key)?;
        }
        Ok(removed)
    }

    /// Delete every timestamped cell of `key` at or before the cutoff
    fn delete_up_to(&self, _key: &str, _cutoff_millis: i64) -> KeyStoreResult<bool> {
        Err(KeyStoreError::not_supported("delete_up_to"))
    }

    /// Batch read. The result has exactly one slot per requested key, in
    /// request order, `None` where the key does not resolve.
    fn get_batch(&self, keys: &[String]) -> KeyStoreResult<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn contains_key(&self, key: &str) -> KeyStoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Whether the key currently holds exactly `content`
    fn matches(&self, key: &str, content: &str) -> KeyStoreResult<bool> {
        Ok(self.get(key)?.as_deref() == Some(content))
    }

    /// Immediate children of a folder prefix
    fn get_sub_keys(&self, prefix: &str) -> KeyStoreResult<Vec<FolderEntry>>;

    /// Every leaf key below a prefix
    fn get_all_sub_keys(&self, prefix: &str) -> KeyStoreResult<Vec<String>>;

    /// Remove the leaves below a folder. Without `force` only direct leaves
    /// go; with it the whole subtree is removed. Leaf entries in the result
    /// carry the full key that was removed.
    fn remove_sub_keys(&self, folder: &str, force: bool) -> KeyStoreResult<Vec<FolderEntry>>;

    /// Visit every key starting with `prefix`, in key order
    fn visit_keys(&self, prefix: &str, visitor: &mut KeyVisitor<'_>) -> KeyStoreResult<()>;

    /// Visit every key after `start` (all keys when `None`), in key order
    fn visit_keys_from_start(
        &self,
        start: Option<&str>,
        visitor: &mut KeyVisitor<'_>,
    ) -> KeyStoreResult<()>;

    fn count_keys(&self) -> KeyStoreResult<u64>;

    /// Approximate stored size in bytes, `None` if the backend cannot tell
    fn size(&self) -> Option<u64> {
        None
    }

    /// Remove every key in this store
    fn drop_key_store(&self) -> KeyStoreResult<()>;

    /// Whether `get_at`/`put_at`/`delete_up_to` are backed by native
    /// per-cell timestamps
    fn supports_version_lookup_by_time(&self) -> bool {
        false
    }

    /// Create a sibling store of the same kind (e.g. the version or meta
    /// store of a repository)
    fn create_related_key_store(&self, relation: &str) -> Arc<dyn KeyStore>;

    /// Index handler able to live alongside this store, if any
    fn create_index_handler(&self, _producer: Arc<dyn IndexProducer>) -> Option<Arc<dyn IndexHandler>> {
        None
    }

    fn validate(&self) -> bool {
        true
    }
}

/// Keys of the non-folder entries in a removal listing
pub fn extract_non_folder_keys(entries: &[FolderEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| !entry.is_folder)
        .map(|entry| entry.name.clone())
        .collect()
}

pub(crate) fn folder_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// Folder listing over any ordered key iterator
pub(crate) fn list_sub_keys<'a>(keys: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<FolderEntry> {
    let prefix = folder_prefix(prefix);
    let mut listing: BTreeMap<String, FolderEntry> = BTreeMap::new();

    for key in keys {
        let Some(tail) = key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let (name, is_folder) = match tail.find('/') {
            Some(slash) => (&tail[..slash], true),
            None => (tail, false),
        };
        if name.is_empty() {
            continue;
        }
        let entry = FolderEntry {
            name: name.to_string(),
            is_folder,
        };
        let listing_key = if is_folder {
            format!("{}/", name)
        } else {
            name.to_string()
        };
        listing.insert(listing_key, entry);
    }

    listing.into_values().collect()
}

/// Leaf keys to delete and the listing to report for a folder removal
pub(crate) fn plan_removal<'a>(
    keys: impl Iterator<Item = &'a str>,
    folder: &str,
    force: bool,
) -> Vec<FolderEntry> {
    let prefix = folder_prefix(folder);
    let mut leaves = Vec::new();
    let mut folders: BTreeMap<String, ()> = BTreeMap::new();

    for key in keys {
        let Some(tail) = key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        if tail.is_empty() {
            continue;
        }
        if !tail.contains('/') {
            leaves.push(FolderEntry::leaf(key));
        } else if force {
            for (slash, _) in tail.match_indices('/') {
                folders.insert(format!("{}{}", prefix, &tail[..slash]), ());
            }
            leaves.push(FolderEntry::leaf(key));
        }
    }

    let mut entries = leaves;
    entries.extend(folders.into_keys().rev().map(FolderEntry::folder));
    if !entries.is_empty() {
        entries.push(FolderEntry::folder(folder.trim_end_matches('/')));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_sub_keys_splits_folders_and_leaves() {
        let keys = ["a/b", "a/c/d", "a/c/e", "b/x"];
        let listing = list_sub_keys(keys.iter().copied(), "a");
        assert_eq!(
            listing,
            vec![FolderEntry::leaf("b"), FolderEntry::folder("c")]
        );
    }

    #[test]
    fn test_list_sub_keys_root() {
        let keys = ["a/b", "top"];
        let listing = list_sub_keys(keys.iter().copied(), "");
        assert_eq!(listing.len(), 2);
        assert!(listing.contains(&FolderEntry::folder("a")));
        assert!(listing.contains(&FolderEntry::leaf("top")));
    }

    #[test]
    fn test_plan_removal_without_force_keeps_subfolders() {
        let keys = ["f/one", "f/sub/two", "g/three"];
        let plan = plan_removal(keys.iter().copied(), "f", false);
        assert_eq!(extract_non_folder_keys(&plan), vec!["f/one".to_string()]);
    }

    #[test]
    fn test_plan_removal_with_force_takes_subtree() {
        let keys = ["f/one", "f/sub/two", "g/three"];
        let plan = plan_removal(keys.iter().copied(), "f", true);
        let leaves = extract_non_folder_keys(&plan);
        assert_eq!(leaves, vec!["f/one".to_string(), "f/sub/two".to_string()]);
        assert!(plan.contains(&FolderEntry::folder("f/sub")));
        assert!(plan.contains(&FolderEntry::folder("f")));
    }

    #[test]
    fn test_plan_removal_empty_folder() {
        let keys = ["g/three"];
        assert!(plan_removal(keys.iter().copied(), "f", true).is_empty());
    }
}
