//! # Meta Handler
//!
//! Shared orchestration for both storage policies. A handler owns three
//! stores:
//!
//! - `document_store`: latest content, keyed by document path
//! - `meta_store`: metadata, under the policy's latest key and (versioned
//!   policy) one key per version
//! - `attribute_store`: side-channel attributes, outside the version chain
//!
//! `MetaHandler` provides the common surface on top of a handful of policy
//! hooks (key construction, metadata derivation, tombstone bookkeeping).
//! None of the operations lock: two concurrent writers to the same path
//! can both read the same latest metadata and race.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::attributes::{self, AttributeType, DocumentAttribute};
use super::clock::{Clock, SystemClock};
use super::errors::{MetaError, MetaResult};
use super::metadata::{DocumentMetadata, DocumentWithMeta, PathRef};
use super::status::store_status;
use super::tags;
use crate::index::{IndexHandler, IndexProducer, TableQueryResult};
use crate::keystore::{extract_non_folder_keys, FolderEntry, KeyStore, KeyVisitor};

/// Stores and collaborators shared by every policy
#[derive(Debug, Clone)]
pub struct MetaHandlerCore {
    pub(crate) document_store: Arc<dyn KeyStore>,
    pub(crate) meta_store: Arc<dyn KeyStore>,
    pub(crate) attribute_store: Arc<dyn KeyStore>,
    pub(crate) index_handler: Option<Arc<dyn IndexHandler>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl MetaHandlerCore {
    pub fn new(
        document_store: Arc<dyn KeyStore>,
        meta_store: Arc<dyn KeyStore>,
        attribute_store: Arc<dyn KeyStore>,
    ) -> Self {
        Self {
            document_store,
            meta_store,
            attribute_store,
            index_handler: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Modification time for the generation after one modified at
    /// `previous`. Strictly later than `previous` even when the clock
    /// stalls or steps back.
    pub fn next_modified(&self, previous: i64) -> i64 {
        self.now().max(previous.saturating_add(1))
    }

    pub fn has_index(&self) -> bool {
        self.index_handler.is_some()
    }

    pub(crate) fn parse_meta(json: Option<String>) -> MetaResult<Option<DocumentMetadata>> {
        json.map(|json| DocumentMetadata::from_json(&json))
            .transpose()
            .map_err(MetaError::from)
    }

    /// Place batch results at their request positions.
    ///
    /// `slots` must already hold one entry per request; slots whose batch
    /// lookup fails stay absent.
    pub(crate) fn assemble(
        slots: &mut [DocumentWithMeta],
        refs: &[PathRef],
        positions: &[usize],
        contents: Vec<Option<String>>,
        metas: Vec<Option<String>>,
    ) -> MetaResult<()> {
        if contents.len() != metas.len() || contents.len() != positions.len() {
            tracing::warn!(
                event = "batch_size_mismatch",
                contents = contents.len(),
                metas = metas.len(),
                requested = positions.len(),
                "Batch read returned mismatched content and metadata"
            );
            return Ok(());
        }
        for ((position, content), meta) in positions.iter().zip(contents).zip(metas) {
            let path = &refs[*position].path;
            slots[*position] = DocumentWithMeta::new(path, content, Self::parse_meta(meta)?);
        }
        Ok(())
    }

    /// Notify the index of a write, if the caller asked for indexing
    fn index_added(
        &self,
        path: &str,
        content: &str,
        meta: &DocumentMetadata,
        producer: Option<&dyn IndexProducer>,
    ) -> MetaResult<()> {
        if producer.is_none() {
            return Ok(());
        }
        match &self.index_handler {
            Some(index) => index.added_record(path, content, meta)?,
            None => tracing::error!(
                event = "index_handler_missing",
                path = %path,
                "Index record produced but no index handler is attached"
            ),
        }
        Ok(())
    }
}

/// Document operations common to the versioned and unversioned policies
pub trait MetaHandler: Send + Sync + Debug {
    fn core(&self) -> &MetaHandlerCore;

    fn core_mut(&mut self) -> &mut MetaHandlerCore;

    fn is_versioned(&self) -> bool;

    /// Meta-store key of the latest metadata for a path
    fn latest_key(&self, path: &str) -> String;

    /// Metadata for the next write of a path
    fn create_new_metadata(&self, user: &str, comment: &str, path: &str) -> MetaResult<DocumentMetadata>;

    /// Record a (content, metadata) pair in the version chain
    fn add_to_version_store(&self, path: &str, content: &str, meta: &DocumentMetadata) -> MetaResult<()>;

    /// Write the tombstone for a path whose content was just removed
    fn update_meta_on_delete(&self, user: &str, path: &str) -> MetaResult<()>;

    /// Order-preserving batch read. The result always has one entry per
    /// reference; unresolvable references come back absent.
    fn get_doc_and_metas(&self, refs: &[PathRef]) -> MetaResult<Vec<DocumentWithMeta>>;

    /// Stores reported by `get_status`, with their display names
    fn status_stores(&self) -> Vec<(&'static str, &Arc<dyn KeyStore>)>;

    /// Remove every metadata (and version) entry of the given paths
    fn purge_meta(&self, paths: &[String]) -> MetaResult<()>;

    /// Drop stores owned by the policy itself
    fn drop_policy_stores(&self) -> MetaResult<()> {
        Ok(())
    }

    fn add_latest_to_meta_store(&self, path: &str, meta: &DocumentMetadata) -> MetaResult<()> {
        self.core()
            .meta_store
            .put(&self.latest_key(path), &meta.to_json()?)?;
        Ok(())
    }

    /// Derive metadata from the latest record, or start a new history at
    /// `default_version`. Tags and the creation time carry over.
    fn create_metadata_from_latest(
        &self,
        user: &str,
        comment: &str,
        path: &str,
        deleted: bool,
        default_version: i32,
        increment_version: bool,
    ) -> MetaResult<DocumentMetadata> {
        let meta = match self.get_latest_meta(path)? {
            Some(mut latest) => {
                if increment_version {
                    latest.version += 1;
                }
                latest.user = user.to_string();
                latest.comment = comment.to_string();
                latest.modified_timestamp = self.core().next_modified(latest.modified_timestamp);
                latest.deleted = deleted;
                latest
            }
            None => {
                let mut fresh = DocumentMetadata::initial(default_version, user, comment, self.core().now());
                fresh.deleted = deleted;
                fresh
            }
        };
        Ok(meta)
    }

    /// Write a new generation of a document.
    ///
    /// Returns `None` without touching any store when `content` equals the
    /// current latest content.
    fn add_document(
        &self,
        path: &str,
        content: &str,
        user: &str,
        comment: &str,
        producer: Option<&dyn IndexProducer>,
    ) -> MetaResult<Option<DocumentWithMeta>> {
        let core = self.core();
        if core.document_store.matches(path, content)? {
            tracing::debug!(event = "duplicate_write_skipped", path = %path, "Content unchanged");
            return Ok(None);
        }

        let meta = self.create_new_metadata(user, comment, path)?;
        self.add_latest_to_meta_store(path, &meta)?;
        core.document_store.put(path, content)?;
        if self.is_versioned() {
            self.add_to_version_store(path, content, &meta)?;
        }
        core.index_added(path, content, &meta, producer)?;

        Ok(Some(DocumentWithMeta::new(path, Some(content.to_string()), Some(meta))))
    }

    /// Remove the latest content of a path and record a tombstone.
    ///
    /// The tombstone is written whether or not content existed; the return
    /// value reports whether any content was removed.
    fn delete_latest(&self, user: &str, path: &str, producer: Option<&dyn IndexProducer>) -> MetaResult<bool> {
        let core = self.core();
        let removed = core.document_store.delete(path)?;
        self.update_meta_on_delete(user, path)?;
        match &core.index_handler {
            Some(index) => index.remove_all(path)?,
            None if producer.is_some() => tracing::error!(
                event = "index_handler_missing",
                path = %path,
                "Index removal requested but no index handler is attached"
            ),
            None => {}
        }
        Ok(removed)
    }

    fn get_document(&self, path: &str) -> MetaResult<Option<String>> {
        Ok(self.core().document_store.get(path)?)
    }

    /// Latest content of several paths, in request order
    fn get_batch(&self, paths: &[String]) -> MetaResult<Vec<Option<String>>> {
        Ok(self.core().document_store.get_batch(paths)?)
    }

    fn contains(&self, path: &str) -> MetaResult<bool> {
        Ok(self.core().document_store.contains_key(path)?)
    }

    fn document_count(&self) -> MetaResult<u64> {
        Ok(self.core().document_store.count_keys()?)
    }

    fn visit_keys(&self, prefix: &str, visitor: &mut KeyVisitor<'_>) -> MetaResult<()> {
        Ok(self.core().document_store.visit_keys(prefix, visitor)?)
    }

    fn visit_keys_from_start(&self, start: Option<&str>, visitor: &mut KeyVisitor<'_>) -> MetaResult<()> {
        Ok(self.core().document_store.visit_keys_from_start(start, visitor)?)
    }

    fn get_latest_meta(&self, path: &str) -> MetaResult<Option<DocumentMetadata>> {
        self.get_meta_from_key(&self.latest_key(path))
    }

    fn get_meta_from_key(&self, key: &str) -> MetaResult<Option<DocumentMetadata>> {
        MetaHandlerCore::parse_meta(self.core().meta_store.get(key)?)
    }

    fn get_latest_doc_and_meta(&self, path: &str) -> MetaResult<DocumentWithMeta> {
        let content = self.core().document_store.get(path)?;
        let meta = self.get_latest_meta(path)?;
        Ok(DocumentWithMeta::new(path, content, meta))
    }

    fn get_children(&self, folder: &str) -> MetaResult<Vec<FolderEntry>> {
        Ok(self.core().document_store.get_sub_keys(folder)?)
    }

    /// Remove the documents below a folder together with their metadata,
    /// version history and index rows
    fn remove_children(&self, folder: &str, force: bool) -> MetaResult<Vec<FolderEntry>> {
        let core = self.core();
        let removed = core.document_store.remove_sub_keys(folder, force)?;
        if removed.is_empty() {
            tracing::debug!(event = "no_children_removed", folder = %folder, "No sub keys found");
            return Ok(removed);
        }

        let paths = extract_non_folder_keys(&removed);
        self.purge_meta(&paths)?;
        if let Some(index) = &core.index_handler {
            for path in &paths {
                index.remove_all(path)?;
            }
        }
        Ok(removed)
    }

    fn get_all_children(&self, folder: &str) -> MetaResult<Vec<String>> {
        Ok(self.core().document_store.get_all_sub_keys(folder)?)
    }

    /// Drop the index table and re-feed every latest document through the
    /// attached index handler. Runs to completion on the calling thread and
    /// sees concurrent writes unpredictably. Returns the number of
    /// documents indexed.
    fn rebuild_index(&self, producer: Option<&dyn IndexProducer>) -> MetaResult<usize> {
        let core = self.core();
        let (Some(index), Some(_)) = (&core.index_handler, producer) else {
            return Ok(0);
        };

        tracing::info!(event = "index_rebuild_started", "Index rebuild, removing existing values");
        index.delete_table()?;

        let mut indexed = 0usize;
        let mut failure: Option<MetaError> = None;
        core.document_store.visit_keys_from_start(None, &mut |path, content| {
            let result = self.get_latest_meta(path).and_then(|meta| match meta {
                Some(meta) => {
                    index.added_record(path, content, &meta)?;
                    indexed += 1;
                    Ok(())
                }
                None => Ok(()),
            });
            match result {
                Ok(()) => true,
                Err(err) => {
                    failure = Some(err);
                    false
                }
            }
        })?;
        if let Some(err) = failure {
            return Err(err);
        }

        tracing::info!(event = "index_rebuild_finished", documents = indexed, "Index rebuild complete");
        Ok(indexed)
    }

    fn set_doc_attribute(&self, path: &str, attribute: &DocumentAttribute) -> MetaResult<()> {
        attributes::set_attribute(self.core().attribute_store.as_ref(), path, attribute)
    }

    fn get_doc_attribute(
        &self,
        path: &str,
        attribute_type: AttributeType,
        key: &str,
    ) -> MetaResult<Option<DocumentAttribute>> {
        attributes::get_attribute(self.core().attribute_store.as_ref(), path, attribute_type, key)
    }

    fn get_doc_attributes(&self, path: &str, attribute_type: AttributeType) -> MetaResult<Vec<DocumentAttribute>> {
        attributes::get_attributes(self.core().attribute_store.as_ref(), path, attribute_type)
    }

    fn delete_doc_attribute(&self, path: &str, attribute_type: AttributeType, key: &str) -> MetaResult<bool> {
        attributes::delete_attribute(self.core().attribute_store.as_ref(), path, attribute_type, key)
    }

    /// Attach the index handler the document store provides for `producer`
    fn set_index_producer(&mut self, producer: Arc<dyn IndexProducer>) {
        let index = self.core().document_store.create_index_handler(producer);
        self.core_mut().index_handler = index;
    }

    /// Query the index; empty when no index is attached
    fn find_index(&self, query: &str) -> MetaResult<TableQueryResult> {
        match &self.core().index_handler {
            Some(index) => Ok(index.query(query)?),
            None => Ok(TableQueryResult::default()),
        }
    }

    fn validate(&self) -> bool {
        self.core().document_store.validate()
    }

    /// Remove every document, its history, attributes and index rows
    fn drop_all(&self) -> MetaResult<()> {
        let core = self.core();
        tracing::info!(event = "repository_dropped", "Dropping all stores");
        core.document_store.drop_key_store()?;
        core.meta_store.drop_key_store()?;
        core.attribute_store.drop_key_store()?;
        self.drop_policy_stores()?;
        if let Some(index) = &core.index_handler {
            index.delete_table()?;
        }
        Ok(())
    }

    fn get_status(&self) -> BTreeMap<String, String> {
        store_status(&self.status_stores())
    }

    /// Apply a tag mutation as a new metadata generation over the latest
    /// content
    fn update_tags(
        &self,
        user: &str,
        path: &str,
        mutate: &mut dyn FnMut(&mut Map<String, Value>) -> MetaResult<()>,
    ) -> MetaResult<DocumentWithMeta> {
        let latest = self.get_latest_doc_and_meta(path)?;
        let (Some(content), Some(mut meta)) = (latest.content, latest.metadata) else {
            return Err(MetaError::DocumentNotFound(path.to_string()));
        };

        mutate(&mut meta.tags)?;
        if self.is_versioned() {
            meta.version += 1;
        }
        meta.user = user.to_string();
        meta.modified_timestamp = self.core().next_modified(meta.modified_timestamp);

        self.add_latest_to_meta_store(path, &meta)?;
        if self.is_versioned() {
            self.add_to_version_store(path, &content, &meta)?;
        }
        Ok(DocumentWithMeta::new(path, Some(content), Some(meta)))
    }

    fn add_document_tag(&self, user: &str, path: &str, tag_path: &str, value: &str) -> MetaResult<DocumentWithMeta> {
        self.update_tags(user, path, &mut |map| tags::add_tag(map, tag_path, value))
    }

    fn add_document_tags(
        &self,
        user: &str,
        path: &str,
        tag_values: &BTreeMap<String, String>,
    ) -> MetaResult<DocumentWithMeta> {
        self.update_tags(user, path, &mut |map| {
            for (tag_path, value) in tag_values {
                tags::add_tag(map, tag_path, value)?;
            }
            Ok(())
        })
    }

    fn remove_document_tag(&self, user: &str, path: &str, tag_path: &str) -> MetaResult<DocumentWithMeta> {
        self.update_tags(user, path, &mut |map| tags::remove_tag(map, tag_path))
    }

    fn remove_document_tags(&self, user: &str, path: &str, tag_paths: &[String]) -> MetaResult<DocumentWithMeta> {
        self.update_tags(user, path, &mut |map| {
            for tag_path in tag_paths {
                tags::remove_tag(map, tag_path)?;
            }
            Ok(())
        })
    }
}
