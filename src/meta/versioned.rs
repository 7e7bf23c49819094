//! # Versioned Policy
//!
//! Every write or delete appends to an append-only version chain starting
//! at version 1. Deletes consume a version number but store no content.
//!
//! Two physical layouts, chosen once from the backend's capabilities:
//!
//! - **Standard**: the version is encoded in the key (`path?3`), the
//!   latest metadata lives under `path?latest`
//! - **Timestamp**: the key is the bare path and each version is a cell at
//!   its modification timestamp; the backend's latest cell doubles as the
//!   latest metadata, so no separate latest entry is written

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::as_of::parse_as_of;
use super::clock::Clock;
use super::errors::{MetaError, MetaResult};
use super::handler::{MetaHandler, MetaHandlerCore};
use super::metadata::{DocumentMetadata, DocumentWithMeta, PathRef, VersionCutoff, VersionSelector};
use crate::index::IndexProducer;
use crate::keystore::KeyStore;

pub const INITIAL_VERSION: i32 = 1;

const LATEST_SUFFIX: &str = "latest";

/// Physical key layout of a versioned repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Version number in the key suffix
    #[default]
    Standard,
    /// Version identified by the backend's per-cell write timestamp
    Timestamp,
}

#[derive(Debug, Clone)]
pub struct VersionedMetaHandler {
    core: MetaHandlerCore,
    version_store: Arc<dyn KeyStore>,
    strategy: KeyStrategy,
}

impl VersionedMetaHandler {
    /// The timestamp layout is used only when both the version and the
    /// meta store support time-scoped lookups.
    pub fn new(
        document_store: Arc<dyn KeyStore>,
        version_store: Arc<dyn KeyStore>,
        meta_store: Arc<dyn KeyStore>,
        attribute_store: Arc<dyn KeyStore>,
    ) -> Self {
        let strategy =
            if version_store.supports_version_lookup_by_time() && meta_store.supports_version_lookup_by_time() {
                KeyStrategy::Timestamp
            } else {
                KeyStrategy::Standard
            };
        Self {
            core: MetaHandlerCore::new(document_store, meta_store, attribute_store),
            version_store,
            strategy,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.core = self.core.with_clock(clock);
        self
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    fn version_key(path: &str, version: i32) -> String {
        format!("{}?{}", path, version)
    }

    fn version_keys(path: &str, up_to: i32) -> Vec<String> {
        (INITIAL_VERSION..=up_to)
            .map(|version| Self::version_key(path, version))
            .collect()
    }

    /// Write only if the latest version is still `expected_version`.
    ///
    /// The check and the write are separate store calls; concurrent
    /// writers to the same path can both pass the check. A path with no
    /// history always passes.
    pub fn add_document_with_expected_version(
        &self,
        path: &str,
        content: &str,
        user: &str,
        comment: &str,
        expected_version: i32,
        producer: Option<&dyn IndexProducer>,
    ) -> MetaResult<bool> {
        if let Some(latest) = self.get_latest_meta(path)? {
            if latest.version != expected_version {
                tracing::debug!(
                    event = "expected_version_mismatch",
                    path = %path,
                    expected = expected_version,
                    actual = latest.version,
                    "Write rejected"
                );
                return Ok(false);
            }
        }
        self.add_document(path, content, user, comment, producer)?;
        Ok(true)
    }

    /// Content and metadata of one version. Tombstone versions carry no
    /// content.
    pub fn get_document_with_meta(&self, path: &str, version: i32) -> MetaResult<DocumentWithMeta> {
        match self.strategy {
            KeyStrategy::Standard => {
                let key = Self::version_key(path, version);
                let content = self.version_store.get(&key)?;
                let meta = self.get_meta_from_key(&key)?;
                Ok(DocumentWithMeta::new(path, content, meta))
            }
            KeyStrategy::Timestamp => {
                let Some(meta) = self.get_meta_from_timestamp_repo(path, version)? else {
                    return Ok(DocumentWithMeta::absent(path));
                };
                let content = if meta.deleted {
                    None
                } else {
                    self.version_store.get_at(path, meta.modified_timestamp)?
                };
                Ok(DocumentWithMeta::new(path, content, Some(meta)))
            }
        }
    }

    /// The version current at an as-of instant; absent if the document did
    /// not exist then
    pub fn get_document_with_meta_as_of(&self, path: &str, as_of: &str) -> MetaResult<DocumentWithMeta> {
        match self.get_version_number_as_of_time(path, as_of)? {
            Some(version) => self.get_document_with_meta(path, version),
            None => Ok(DocumentWithMeta::absent(path)),
        }
    }

    pub fn get_version_meta(&self, path: &str, version: i32) -> MetaResult<Option<DocumentMetadata>> {
        match self.strategy {
            KeyStrategy::Standard => self.get_meta_from_key(&Self::version_key(path, version)),
            KeyStrategy::Timestamp => self.get_meta_from_timestamp_repo(path, version),
        }
    }

    /// Locate the metadata of `target_version` under the timestamp layout.
    ///
    /// Steps back from the latest cell by `current - target` milliseconds
    /// at a time, i.e. assumes one version per millisecond. Versions
    /// written within the same millisecond overwrite each other's cell, so
    /// this can come back empty for a version that was written.
    pub fn get_meta_from_timestamp_repo(&self, path: &str, target_version: i32) -> MetaResult<Option<DocumentMetadata>> {
        if self.strategy != KeyStrategy::Timestamp {
            return Err(MetaError::Unsupported(format!(
                "time-scoped metadata lookup for {} needs a timestamp-capable store",
                path
            )));
        }

        let Some(mut meta) = self.get_latest_meta(path)? else {
            return Ok(None);
        };
        if target_version < INITIAL_VERSION || target_version > meta.version {
            return Ok(None);
        }
        while meta.version > target_version {
            let versions_back = i64::from(meta.version - target_version);
            let probe = meta.modified_timestamp - versions_back;
            let Some(earlier) = MetaHandlerCore::parse_meta(self.core.meta_store.get_at(path, probe)?)? else {
                return Ok(None);
            };
            if earlier.version >= meta.version {
                return Ok(None);
            }
            meta = earlier;
        }
        Ok((meta.version == target_version).then_some(meta))
    }

    /// Newest version whose modification time is at or before the as-of
    /// instant.
    ///
    /// `Ok(None)` when the instant predates the document; an error when a
    /// version on the way back has no metadata any more.
    pub fn get_version_number_as_of_time(&self, path: &str, as_of: &str) -> MetaResult<Option<i32>> {
        let target = parse_as_of(as_of)?;
        let Some(latest) = self.get_latest_meta(path)? else {
            return Ok(None);
        };
        if latest.created_timestamp > target {
            return Ok(None);
        }

        let mut version = latest.version;
        let mut meta = Some(latest);
        loop {
            match meta {
                Some(current) if current.modified_timestamp > target => {
                    version = current.version - 1;
                    if version < INITIAL_VERSION {
                        return Ok(None);
                    }
                    meta = self.get_version_meta(path, version)?;
                }
                Some(_) => return Ok(Some(version)),
                None => {
                    return Err(MetaError::IncalculableVersion {
                        path: path.to_string(),
                        as_of: as_of.to_string(),
                    })
                }
            }
        }
    }

    /// Write the content of the previous version as a new version. History
    /// is never rewritten.
    pub fn revert_doc(&self, path: &str, producer: Option<&dyn IndexProducer>) -> MetaResult<DocumentWithMeta> {
        let latest = self
            .get_latest_meta(path)?
            .ok_or_else(|| MetaError::DocumentNotFound(path.to_string()))?;
        if latest.version <= INITIAL_VERSION {
            return Err(MetaError::NoPreviousVersion(path.to_string()));
        }

        let previous = self.get_document_with_meta(path, latest.version - 1)?;
        let (Some(content), Some(meta)) = (previous.content, previous.metadata) else {
            return Err(MetaError::NoPreviousVersion(path.to_string()));
        };

        let comment = format!("{} - REVERTED", meta.comment);
        self.add_document(path, &content, &meta.user, &comment, producer)?;
        self.get_latest_doc_and_meta(path)
    }

    /// Delete every version at or below the cutoff. Remaining versions keep
    /// their numbers and the latest version is always retained.
    pub fn delete_old_versions(&self, path: &str, cutoff: VersionCutoff) -> MetaResult<bool> {
        let Some(latest) = self.get_latest_meta(path)? else {
            return Ok(false);
        };

        match self.strategy {
            KeyStrategy::Standard => {
                let cutoff_version = match cutoff {
                    VersionCutoff::Version(version) => version,
                    VersionCutoff::Timestamp(millis) => self.last_version_modified_by(path, latest.version, millis)?,
                }
                .min(latest.version - 1);
                if cutoff_version < INITIAL_VERSION {
                    return Ok(true);
                }

                let keys = Self::version_keys(path, cutoff_version);
                self.core.meta_store.delete_keys(&keys)?;
                self.version_store.delete_keys(&keys)?;
                tracing::debug!(event = "versions_deleted", path = %path, cutoff = cutoff_version, "Old versions deleted");
            }
            KeyStrategy::Timestamp => {
                let cutoff_millis = match cutoff {
                    VersionCutoff::Timestamp(millis) => millis,
                    VersionCutoff::Version(version) => {
                        let version = version.min(latest.version - 1);
                        if version < INITIAL_VERSION {
                            return Ok(true);
                        }
                        match self.get_meta_from_timestamp_repo(path, version)? {
                            Some(meta) => meta.modified_timestamp,
                            None => return Ok(false),
                        }
                    }
                }
                .min(latest.modified_timestamp - 1);

                self.core.meta_store.delete_up_to(path, cutoff_millis)?;
                self.version_store.delete_up_to(path, cutoff_millis)?;
                tracing::debug!(event = "versions_deleted", path = %path, cutoff_millis, "Old versions deleted");
            }
        }
        Ok(true)
    }

    /// Highest version below `latest_version` modified at or before
    /// `millis`, or 0 when there is none
    fn last_version_modified_by(&self, path: &str, latest_version: i32, millis: i64) -> MetaResult<i32> {
        let mut cutoff = 0;
        for version in INITIAL_VERSION..latest_version {
            match self.get_version_meta(path, version)? {
                Some(meta) if meta.modified_timestamp <= millis => cutoff = version,
                Some(_) => break,
                None => continue,
            }
        }
        Ok(cutoff)
    }

    /// Retention pass over one document.
    ///
    /// Keeps at most `version_limit` versions. Unless `ensure_version_limit`
    /// is set, the walk back also stops at the first version modified before
    /// `time_limit_millis`, which becomes the cutoff. A cutoff at the latest
    /// version deletes the document itself.
    pub fn archive_document_versions(
        &self,
        path: &str,
        version_limit: i32,
        time_limit_millis: i64,
        ensure_version_limit: bool,
        user: &str,
    ) -> MetaResult<bool> {
        if version_limit <= 0 {
            tracing::error!(event = "archive_rejected", path = %path, version_limit, "Version limit must be positive");
            return Ok(false);
        }
        let Some(latest) = self.get_latest_meta(path)? else {
            return Ok(false);
        };
        let latest_version = latest.version;

        let mut remaining = version_limit;
        let mut cutoff_version = -1;
        let mut meta = Some(latest);
        while let Some(current) = meta {
            if current.modified_timestamp < time_limit_millis && !ensure_version_limit {
                cutoff_version = current.version;
                break;
            }
            remaining -= 1;
            if remaining <= 0 {
                cutoff_version = current.version - 1;
                break;
            }
            if current.version <= INITIAL_VERSION {
                break;
            }
            meta = self.get_version_meta(path, current.version - 1)?;
        }

        tracing::info!(
            event = "archive_versions",
            path = %path,
            latest_version,
            cutoff_version,
            "Archiving old versions"
        );
        if cutoff_version < INITIAL_VERSION {
            return Ok(true);
        }
        if cutoff_version == latest_version {
            return self.delete_latest(user, path, None);
        }
        self.delete_old_versions(path, VersionCutoff::Version(cutoff_version))
    }

    fn versioned_partition(&self, refs: &[PathRef], slots: &mut [DocumentWithMeta]) -> MetaResult<()> {
        let mut positions = Vec::new();
        let mut versions = Vec::new();
        for (position, reference) in refs.iter().enumerate() {
            let version = match &reference.selector {
                VersionSelector::Latest => continue,
                VersionSelector::Version(version) => Some(*version),
                VersionSelector::AsOf(as_of) => match self.get_version_number_as_of_time(&reference.path, as_of) {
                    Ok(version) => version,
                    Err(MetaError::IncalculableVersion { .. }) => None,
                    Err(err) => return Err(err),
                },
            };
            if let Some(version) = version {
                positions.push(position);
                versions.push(version);
            }
        }

        match self.strategy {
            KeyStrategy::Standard => {
                let keys: Vec<String> = positions
                    .iter()
                    .zip(&versions)
                    .map(|(position, version)| Self::version_key(&refs[*position].path, *version))
                    .collect();
                let contents = self.version_store.get_batch(&keys)?;
                let metas = self.core.meta_store.get_batch(&keys)?;
                MetaHandlerCore::assemble(slots, refs, &positions, contents, metas)
            }
            KeyStrategy::Timestamp => {
                for (position, version) in positions.iter().zip(versions) {
                    slots[*position] = self.get_document_with_meta(&refs[*position].path, version)?;
                }
                Ok(())
            }
        }
    }
}

impl MetaHandler for VersionedMetaHandler {
    fn core(&self) -> &MetaHandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MetaHandlerCore {
        &mut self.core
    }

    fn is_versioned(&self) -> bool {
        true
    }

    fn latest_key(&self, path: &str) -> String {
        match self.strategy {
            KeyStrategy::Standard => format!("{}?{}", path, LATEST_SUFFIX),
            KeyStrategy::Timestamp => path.to_string(),
        }
    }

    fn add_latest_to_meta_store(&self, path: &str, meta: &DocumentMetadata) -> MetaResult<()> {
        if self.strategy == KeyStrategy::Standard {
            self.core.meta_store.put(&self.latest_key(path), &meta.to_json()?)?;
        }
        Ok(())
    }

    fn create_new_metadata(&self, user: &str, comment: &str, path: &str) -> MetaResult<DocumentMetadata> {
        self.create_metadata_from_latest(user, comment, path, false, INITIAL_VERSION, true)
    }

    fn add_to_version_store(&self, path: &str, content: &str, meta: &DocumentMetadata) -> MetaResult<()> {
        let json = meta.to_json()?;
        match self.strategy {
            KeyStrategy::Standard => {
                let key = Self::version_key(path, meta.version);
                self.core.meta_store.put(&key, &json)?;
                self.version_store.put(&key, content)?;
            }
            KeyStrategy::Timestamp => {
                self.core.meta_store.put_at(path, meta.modified_timestamp, &json)?;
                self.version_store.put_at(path, meta.modified_timestamp, content)?;
            }
        }
        Ok(())
    }

    fn update_meta_on_delete(&self, user: &str, path: &str) -> MetaResult<()> {
        let tombstone = self.create_metadata_from_latest(user, "Deleted", path, true, INITIAL_VERSION, true)?;
        let json = tombstone.to_json()?;
        match self.strategy {
            KeyStrategy::Standard => {
                self.core.meta_store.put(&self.latest_key(path), &json)?;
                self.core
                    .meta_store
                    .put(&Self::version_key(path, tombstone.version), &json)?;
            }
            KeyStrategy::Timestamp => {
                self.core.meta_store.put_at(path, tombstone.modified_timestamp, &json)?;
            }
        }
        Ok(())
    }

    /// Explicit versions and resolved as-of references are read from the
    /// version chain, the rest from the latest entries. Results are placed
    /// by request position.
    fn get_doc_and_metas(&self, refs: &[PathRef]) -> MetaResult<Vec<DocumentWithMeta>> {
        let mut slots: Vec<DocumentWithMeta> = refs.iter().map(|r| DocumentWithMeta::absent(&r.path)).collect();
        if refs.is_empty() {
            return Ok(slots);
        }

        self.versioned_partition(refs, &mut slots)?;

        let latest_positions: Vec<usize> = refs
            .iter()
            .enumerate()
            .filter(|(_, reference)| reference.selector == VersionSelector::Latest)
            .map(|(position, _)| position)
            .collect();
        let paths: Vec<String> = latest_positions.iter().map(|p| refs[*p].path.clone()).collect();
        let meta_keys: Vec<String> = paths.iter().map(|path| self.latest_key(path)).collect();
        let contents = self.core.document_store.get_batch(&paths)?;
        let metas = self.core.meta_store.get_batch(&meta_keys)?;
        MetaHandlerCore::assemble(&mut slots, refs, &latest_positions, contents, metas)?;

        Ok(slots)
    }

    fn status_stores(&self) -> Vec<(&'static str, &Arc<dyn KeyStore>)> {
        vec![
            ("Latest", &self.core.document_store),
            ("Version", &self.version_store),
            ("Meta", &self.core.meta_store),
        ]
    }

    fn purge_meta(&self, paths: &[String]) -> MetaResult<()> {
        match self.strategy {
            KeyStrategy::Standard => {
                for path in paths {
                    let latest_key = self.latest_key(path);
                    let mut keys = match self.get_meta_from_key(&latest_key)? {
                        Some(latest) => Self::version_keys(path, latest.version),
                        None => Vec::new(),
                    };
                    self.version_store.delete_keys(&keys)?;
                    keys.push(latest_key);
                    self.core.meta_store.delete_keys(&keys)?;
                }
            }
            KeyStrategy::Timestamp => {
                self.core.meta_store.delete_keys(paths)?;
                self.version_store.delete_keys(paths)?;
            }
        }
        Ok(())
    }

    fn drop_policy_stores(&self) -> MetaResult<()> {
        self.version_store.drop_key_store()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FieldIndexProducer;
    use crate::keystore::{MemKeyStore, MemTimestampKeyStore};
    use crate::meta::{millis_directive, ManualClock};

    fn standard(clock: Arc<ManualClock>) -> VersionedMetaHandler {
        VersionedMetaHandler::new(
            Arc::new(MemKeyStore::new()),
            Arc::new(MemKeyStore::new()),
            Arc::new(MemKeyStore::new()),
            Arc::new(MemKeyStore::new()),
        )
        .with_clock(clock)
    }

    fn timestamped(clock: Arc<ManualClock>) -> VersionedMetaHandler {
        VersionedMetaHandler::new(
            Arc::new(MemKeyStore::new()),
            Arc::new(MemTimestampKeyStore::new()),
            Arc::new(MemTimestampKeyStore::new()),
            Arc::new(MemKeyStore::new()),
        )
        .with_clock(clock)
    }

    #[test]
    fn test_strategy_follows_store_capability() {
        let clock = Arc::new(ManualClock::new(0));
        assert_eq!(standard(clock.clone()).strategy(), KeyStrategy::Standard);
        assert_eq!(timestamped(clock.clone()).strategy(), KeyStrategy::Timestamp);

        // one capable store is not enough
        let mixed = VersionedMetaHandler::new(
            Arc::new(MemKeyStore::new()),
            Arc::new(MemTimestampKeyStore::new()),
            Arc::new(MemKeyStore::new()),
            Arc::new(MemKeyStore::new()),
        );
        assert_eq!(mixed.strategy(), KeyStrategy::Standard);
    }

    #[test]
    fn test_key_layout() {
        let handler = standard(Arc::new(ManualClock::new(0)));
        assert_eq!(handler.latest_key("a/b"), "a/b?latest");
        assert_eq!(VersionedMetaHandler::version_key("a/b", 4), "a/b?4");
        assert_eq!(timestamped(Arc::new(ManualClock::new(0))).latest_key("a/b"), "a/b");
    }

    #[test]
    fn test_walkthrough() {
        let clock = Arc::new(ManualClock::new(1_000));
        let handler = standard(clock.clone());

        let v1 = handler.add_document("//x", r#"{"a":1}"#, "u", "c", None).unwrap().unwrap();
        assert_eq!(v1.version(), Some(1));

        clock.advance(500);
        assert!(handler.add_document("//x", r#"{"a":1}"#, "u", "c", None).unwrap().is_none());
        let meta = handler.get_latest_meta("//x").unwrap().unwrap();
        assert_eq!(meta.version, 1);
        assert_eq!(meta.modified_timestamp, 1_000);

        clock.set(2_000);
        let v2 = handler.add_document("//x", r#"{"a":2}"#, "u", "c", None).unwrap().unwrap();
        assert_eq!(v2.version(), Some(2));

        let as_of = millis_directive(1_500);
        assert_eq!(handler.get_version_number_as_of_time("//x", &as_of).unwrap(), Some(1));

        clock.set(3_000);
        assert!(handler.delete_latest("u", "//x", None).unwrap());
        let tombstone = handler.get_latest_meta("//x").unwrap().unwrap();
        assert_eq!(tombstone.version, 3);
        assert!(tombstone.deleted);
        assert_eq!(handler.get_document("//x").unwrap(), None);

        let v2 = handler.get_document_with_meta("//x", 2).unwrap();
        assert_eq!(v2.content.as_deref(), Some(r#"{"a":2}"#));
    }

    #[test]
    fn test_expected_version() {
        let handler = standard(Arc::new(ManualClock::ticking(0, 1)));
        assert!(handler
            .add_document_with_expected_version("p", "a", "u", "c", 99, None)
            .unwrap());
        assert!(!handler
            .add_document_with_expected_version("p", "b", "u", "c", 2, None)
            .unwrap());
        assert_eq!(handler.get_document("p").unwrap().as_deref(), Some("a"));
        assert!(handler
            .add_document_with_expected_version("p", "b", "u", "c", 1, None)
            .unwrap());
        assert_eq!(handler.get_latest_meta("p").unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_revert_needs_history() {
        let handler = standard(Arc::new(ManualClock::ticking(0, 1)));
        assert!(matches!(
            handler.revert_doc("p", None),
            Err(MetaError::DocumentNotFound(_))
        ));
        handler.add_document("p", "a", "u", "c", None).unwrap();
        assert!(matches!(
            handler.revert_doc("p", None),
            Err(MetaError::NoPreviousVersion(_))
        ));
    }

    #[test]
    fn test_revert_after_delete_restores_content() {
        let handler = standard(Arc::new(ManualClock::ticking(0, 1)));
        handler.add_document("p", "a", "writer", "first", None).unwrap();
        handler.delete_latest("u", "p", None).unwrap();

        let reverted = handler.revert_doc("p", None).unwrap();
        assert_eq!(reverted.content.as_deref(), Some("a"));
        let meta = reverted.metadata.unwrap();
        assert_eq!(meta.version, 3);
        assert_eq!(meta.comment, "first - REVERTED");
        assert_eq!(meta.user, "writer");
        assert!(!meta.deleted);
    }

    #[test]
    fn test_delete_old_versions_keeps_latest() {
        let handler = standard(Arc::new(ManualClock::ticking(0, 10)));
        for content in ["a", "b", "c"] {
            handler.add_document("p", content, "u", "c", None).unwrap();
        }

        assert!(handler.delete_old_versions("p", VersionCutoff::Version(10)).unwrap());
        assert!(handler.get_version_meta("p", 1).unwrap().is_none());
        assert!(handler.get_version_meta("p", 2).unwrap().is_none());
        let v3 = handler.get_document_with_meta("p", 3).unwrap();
        assert_eq!(v3.content.as_deref(), Some("c"));
        assert_eq!(handler.get_latest_meta("p").unwrap().unwrap().version, 3);
    }

    #[test]
    fn test_delete_old_versions_by_time() {
        let handler = standard(Arc::new(ManualClock::ticking(100, 100)));
        for content in ["a", "b", "c", "d"] {
            handler.add_document("p", content, "u", "c", None).unwrap();
        }
        // versions modified at 100, 200, 300, 400
        assert!(handler.delete_old_versions("p", VersionCutoff::Timestamp(250)).unwrap());
        assert!(handler.get_version_meta("p", 2).unwrap().is_none());
        assert!(handler.get_version_meta("p", 3).unwrap().is_some());
    }

    #[test]
    fn test_as_of_after_pruning_is_incalculable() {
        let handler = standard(Arc::new(ManualClock::ticking(100, 100)));
        for content in ["a", "b", "c"] {
            handler.add_document("p", content, "u", "c", None).unwrap();
        }
        handler.delete_old_versions("p", VersionCutoff::Version(2)).unwrap();

        let err = handler
            .get_version_number_as_of_time("p", &millis_directive(150))
            .unwrap_err();
        assert!(matches!(err, MetaError::IncalculableVersion { .. }));
    }

    #[test]
    fn test_archive_keeps_version_limit() {
        let handler = standard(Arc::new(ManualClock::ticking(1_000, 1_000)));
        for content in ["a", "b", "c", "d", "e"] {
            handler.add_document("p", content, "u", "c", None).unwrap();
        }

        assert!(!handler.archive_document_versions("p", 0, 0, true, "u").unwrap());
        assert!(handler.archive_document_versions("p", 2, 0, true, "u").unwrap());
        assert!(handler.get_version_meta("p", 3).unwrap().is_none());
        assert!(handler.get_version_meta("p", 4).unwrap().is_some());
        assert_eq!(handler.get_document("p").unwrap().as_deref(), Some("e"));
    }

    #[test]
    fn test_archive_cutoff_at_latest_deletes_document() {
        let handler = standard(Arc::new(ManualClock::ticking(1_000, 1_000)));
        handler.add_document("p", "a", "u", "c", None).unwrap();
        handler.add_document("p", "b", "u", "c", None).unwrap();

        // everything is older than the time limit
        assert!(handler.archive_document_versions("p", 5, 1_000_000, false, "archiver").unwrap());
        assert_eq!(handler.get_document("p").unwrap(), None);
        let meta = handler.get_latest_meta("p").unwrap().unwrap();
        assert!(meta.deleted);
        assert_eq!(meta.user, "archiver");
    }

    #[test]
    fn test_timestamp_lookup_rejected_on_standard_layout() {
        let handler = standard(Arc::new(ManualClock::new(0)));
        let err = handler.get_meta_from_timestamp_repo("p", 1).unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_timestamp_layout_reads_versions() {
        let handler = timestamped(Arc::new(ManualClock::ticking(1_000, 1)));
        for content in ["a", "b", "c"] {
            handler.add_document("p", content, "u", "c", None).unwrap();
        }
        for (version, content) in [(1, "a"), (2, "b"), (3, "c")] {
            let doc = handler.get_document_with_meta("p", version).unwrap();
            assert_eq!(doc.content.as_deref(), Some(content));
            assert_eq!(doc.version(), Some(version));
        }
    }

    #[test]
    fn test_modified_strictly_increases() {
        let clock = Arc::new(ManualClock::new(5_000));
        let handler = standard(clock.clone());
        handler.add_document("p", "a", "u", "c", None).unwrap();
        handler.add_document("p", "b", "u", "c", None).unwrap();

        clock.set(4_000);
        handler.add_document("p", "c", "u", "c", None).unwrap();
        handler.delete_latest("u", "p", None).unwrap();

        let mut previous = i64::MIN;
        for version in 1..=4 {
            let meta = handler.get_version_meta("p", version).unwrap().unwrap();
            assert!(meta.modified_timestamp > previous, "version {}", version);
            if version > 1 {
                assert!(meta.modified_timestamp > meta.created_timestamp);
            }
            previous = meta.modified_timestamp;
        }
        assert_eq!(previous, 5_003);
        assert_eq!(
            handler.get_version_number_as_of_time("p", &millis_directive(5_001)).unwrap(),
            Some(2)
        );
    }

    #[test]
    fn test_timestamp_layout_keeps_same_millisecond_versions() {
        let handler = timestamped(Arc::new(ManualClock::new(1_000)));
        for content in ["a", "b", "c"] {
            handler.add_document("p", content, "u", "c", None).unwrap();
        }
        for (version, content) in [(1, "a"), (2, "b"), (3, "c")] {
            let doc = handler.get_document_with_meta("p", version).unwrap();
            assert_eq!(doc.content.as_deref(), Some(content));
            assert_eq!(doc.version(), Some(version));
        }
    }

    #[test]
    fn test_delete_missing_document_consumes_version() {
        let handler = standard(Arc::new(ManualClock::ticking(0, 1)));
        assert!(!handler.delete_latest("u", "ghost", None).unwrap());
        let tombstone = handler.get_latest_meta("ghost").unwrap().unwrap();
        assert_eq!(tombstone.version, INITIAL_VERSION);
        assert!(tombstone.deleted);

        assert!(!handler.delete_latest("u", "ghost", None).unwrap());
        assert_eq!(handler.get_latest_meta("ghost").unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_rebuild_index_counts_documents_with_metadata() {
        let mut handler = standard(Arc::new(ManualClock::ticking(0, 1)));
        let producer: Arc<dyn IndexProducer> = Arc::new(FieldIndexProducer::new(["name"]));
        handler.set_index_producer(producer.clone());
        handler.add_document("a", r#"{"name":"ann"}"#, "u", "c", None).unwrap();
        handler.core.document_store.put("b", r#"{"name":"bob"}"#).unwrap();

        assert_eq!(handler.rebuild_index(Some(producer.as_ref())).unwrap(), 1);
        let rows = handler.find_index("SELECT name").unwrap().rows;
        assert_eq!(rows, vec![vec![serde_json::Value::from("ann")]]);
    }

    #[test]
    fn test_remove_children_purges_history() {
        let handler = standard(Arc::new(ManualClock::ticking(0, 1)));
        handler.add_document("f/a", "1", "u", "c", None).unwrap();
        handler.add_document("f/a", "2", "u", "c", None).unwrap();
        handler.add_document("g/b", "3", "u", "c", None).unwrap();

        let removed = handler.remove_children("f", false).unwrap();
        assert!(removed.iter().any(|entry| entry.name == "f/a" && !entry.is_folder));
        assert!(handler.get_latest_meta("f/a").unwrap().is_none());
        assert!(handler.get_version_meta("f/a", 1).unwrap().is_none());
        assert!(handler.get_document_with_meta("f/a", 2).unwrap().is_absent());
        assert!(handler.get_latest_meta("g/b").unwrap().is_some());
    }
}
