//! # Unversioned Policy
//!
//! Only the latest generation of a document is retrievable. Every
//! metadata record carries the sentinel version and deletes overwrite the
//! latest metadata with a tombstone.

use std::sync::Arc;

use super::clock::Clock;
use super::errors::MetaResult;
use super::handler::{MetaHandler, MetaHandlerCore};
use super::metadata::{DocumentMetadata, DocumentWithMeta, PathRef, UNVERSIONED_SENTINEL};
use crate::keystore::KeyStore;

#[derive(Debug, Clone)]
pub struct UnversionedMetaHandler {
    core: MetaHandlerCore,
}

impl UnversionedMetaHandler {
    pub fn new(
        document_store: Arc<dyn KeyStore>,
        meta_store: Arc<dyn KeyStore>,
        attribute_store: Arc<dyn KeyStore>,
    ) -> Self {
        Self {
            core: MetaHandlerCore::new(document_store, meta_store, attribute_store),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.core = self.core.with_clock(clock);
        self
    }
}

impl MetaHandler for UnversionedMetaHandler {
    fn core(&self) -> &MetaHandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MetaHandlerCore {
        &mut self.core
    }

    fn is_versioned(&self) -> bool {
        false
    }

    fn latest_key(&self, path: &str) -> String {
        format!("{}?{}", path, UNVERSIONED_SENTINEL)
    }

    fn create_new_metadata(&self, user: &str, comment: &str, path: &str) -> MetaResult<DocumentMetadata> {
        self.create_metadata_from_latest(user, comment, path, false, UNVERSIONED_SENTINEL, false)
    }

    fn add_to_version_store(&self, _path: &str, _content: &str, _meta: &DocumentMetadata) -> MetaResult<()> {
        Ok(())
    }

    fn update_meta_on_delete(&self, user: &str, path: &str) -> MetaResult<()> {
        let tombstone = self.create_metadata_from_latest(user, "Deleted", path, true, UNVERSIONED_SENTINEL, false)?;
        self.add_latest_to_meta_store(path, &tombstone)
    }

    fn get_doc_and_metas(&self, refs: &[PathRef]) -> MetaResult<Vec<DocumentWithMeta>> {
        let mut slots: Vec<DocumentWithMeta> = refs.iter().map(|r| DocumentWithMeta::absent(&r.path)).collect();
        if refs.is_empty() {
            return Ok(slots);
        }

        let positions: Vec<usize> = (0..refs.len()).collect();
        let paths: Vec<String> = refs.iter().map(|r| r.path.clone()).collect();
        let meta_keys: Vec<String> = refs.iter().map(|r| self.latest_key(&r.path)).collect();

        let contents = self.core.document_store.get_batch(&paths)?;
        let metas = self.core.meta_store.get_batch(&meta_keys)?;
        MetaHandlerCore::assemble(&mut slots, refs, &positions, contents, metas)?;
        Ok(slots)
    }

    fn status_stores(&self) -> Vec<(&'static str, &Arc<dyn KeyStore>)> {
        vec![("Latest", &self.core.document_store), ("Meta", &self.core.meta_store)]
    }

    fn purge_meta(&self, paths: &[String]) -> MetaResult<()> {
        let keys: Vec<String> = paths.iter().map(|path| self.latest_key(path)).collect();
        self.core.meta_store.delete_keys(&keys)?;
        Ok(())
    }
}
