//! # Repository
//!
//! A document repository scoped to one authority, holding either storage
//! policy. Operations both policies share go through [`Repository::handler`];
//! version-aware operations are only available on versioned repositories
//! and fail with `MetaError::Unsupported` otherwise.

use crate::index::IndexProducer;
use crate::meta::{
    DocumentWithMeta, MetaError, MetaHandler, MetaResult, PathRef, UnversionedMetaHandler, VersionCutoff,
    VersionSelector, VersionedMetaHandler,
};

/// The storage policy of a repository
#[derive(Debug)]
pub enum Policy {
    Versioned(VersionedMetaHandler),
    Unversioned(UnversionedMetaHandler),
}

#[derive(Debug)]
pub struct Repository {
    authority: String,
    policy: Policy,
}

impl Repository {
    pub fn new(authority: impl Into<String>, policy: Policy) -> Self {
        Self {
            authority: authority.into(),
            policy,
        }
    }

    pub fn versioned(authority: impl Into<String>, handler: VersionedMetaHandler) -> Self {
        Self::new(authority, Policy::Versioned(handler))
    }

    pub fn unversioned(authority: impl Into<String>, handler: UnversionedMetaHandler) -> Self {
        Self::new(authority, Policy::Unversioned(handler))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn is_versioned(&self) -> bool {
        matches!(self.policy, Policy::Versioned(_))
    }

    pub fn handler(&self) -> &dyn MetaHandler {
        match &self.policy {
            Policy::Versioned(handler) => handler,
            Policy::Unversioned(handler) => handler,
        }
    }

    pub fn handler_mut(&mut self) -> &mut dyn MetaHandler {
        match &mut self.policy {
            Policy::Versioned(handler) => handler,
            Policy::Unversioned(handler) => handler,
        }
    }

    fn versioned_handler(&self, operation: &str) -> MetaResult<&VersionedMetaHandler> {
        match &self.policy {
            Policy::Versioned(handler) => Ok(handler),
            Policy::Unversioned(_) => Err(MetaError::Unsupported(format!(
                "{} on unversioned repository {}",
                operation, self.authority
            ))),
        }
    }

    pub fn add_document(
        &self,
        path: &str,
        content: &str,
        user: &str,
        comment: &str,
        producer: Option<&dyn IndexProducer>,
    ) -> MetaResult<Option<DocumentWithMeta>> {
        self.handler().add_document(path, content, user, comment, producer)
    }

    pub fn delete_document(&self, user: &str, path: &str, producer: Option<&dyn IndexProducer>) -> MetaResult<bool> {
        self.handler().delete_latest(user, path, producer)
    }

    pub fn get_document(&self, path: &str) -> MetaResult<Option<String>> {
        self.handler().get_document(path)
    }

    pub fn get_doc_and_metas(&self, refs: &[PathRef]) -> MetaResult<Vec<DocumentWithMeta>> {
        self.handler().get_doc_and_metas(refs)
    }

    /// Resolve a single reference.
    ///
    /// Unlike the batch read, an as-of reference the document did not exist
    /// at is an `IncalculableVersion` error.
    pub fn get_doc_and_meta(&self, reference: &PathRef) -> MetaResult<DocumentWithMeta> {
        match &reference.selector {
            VersionSelector::Latest => self.handler().get_latest_doc_and_meta(&reference.path),
            VersionSelector::Version(version) => self
                .versioned_handler("versioned read")?
                .get_document_with_meta(&reference.path, *version),
            VersionSelector::AsOf(as_of) => {
                let handler = self.versioned_handler("as-of read")?;
                match handler.get_version_number_as_of_time(&reference.path, as_of)? {
                    Some(version) => handler.get_document_with_meta(&reference.path, version),
                    None => Err(MetaError::IncalculableVersion {
                        path: reference.path.clone(),
                        as_of: as_of.clone(),
                    }),
                }
            }
        }
    }

    pub fn add_document_with_expected_version(
        &self,
        path: &str,
        content: &str,
        user: &str,
        comment: &str,
        expected_version: i32,
        producer: Option<&dyn IndexProducer>,
    ) -> MetaResult<bool> {
        self.versioned_handler("expected-version write")?
            .add_document_with_expected_version(path, content, user, comment, expected_version, producer)
    }

    pub fn get_version_number_as_of_time(&self, path: &str, as_of: &str) -> MetaResult<Option<i32>> {
        self.versioned_handler("as-of lookup")?
            .get_version_number_as_of_time(path, as_of)
    }

    pub fn revert_doc(&self, path: &str, producer: Option<&dyn IndexProducer>) -> MetaResult<DocumentWithMeta> {
        self.versioned_handler("revert")?.revert_doc(path, producer)
    }

    pub fn delete_old_versions(&self, path: &str, cutoff: VersionCutoff) -> MetaResult<bool> {
        self.versioned_handler("version pruning")?
            .delete_old_versions(path, cutoff)
    }

    pub fn archive_document_versions(
        &self,
        path: &str,
        version_limit: i32,
        time_limit_millis: i64,
        ensure_version_limit: bool,
        user: &str,
    ) -> MetaResult<bool> {
        self.versioned_handler("archive")?.archive_document_versions(
            path,
            version_limit,
            time_limit_millis,
            ensure_version_limit,
            user,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::keystore::MemKeyStore;
    use crate::meta::{millis_directive, ManualClock};

    fn stores() -> Arc<MemKeyStore> {
        Arc::new(MemKeyStore::new())
    }

    fn versioned(clock: Arc<ManualClock>) -> Repository {
        let handler = VersionedMetaHandler::new(stores(), stores(), stores(), stores()).with_clock(clock);
        Repository::versioned("docs", handler)
    }

    fn unversioned() -> Repository {
        let handler = UnversionedMetaHandler::new(stores(), stores(), stores());
        Repository::unversioned("scratch", handler)
    }

    #[test]
    fn test_as_of_before_creation_is_incalculable() {
        let clock = Arc::new(ManualClock::new(10_000));
        let repo = versioned(clock);
        repo.add_document("p", "a", "u", "c", None).unwrap();

        let err = repo
            .get_doc_and_meta(&PathRef::as_of("p", millis_directive(5_000)))
            .unwrap_err();
        assert!(matches!(err, MetaError::IncalculableVersion { .. }));
        assert_eq!(err.to_string(), "Cannot calculate version of p as of t5000");
    }

    #[test]
    fn test_single_reads() {
        let clock = Arc::new(ManualClock::ticking(1_000, 1_000));
        let repo = versioned(clock);
        repo.add_document("p", "a", "u", "c", None).unwrap();
        repo.add_document("p", "b", "u", "c", None).unwrap();

        let latest = repo.get_doc_and_meta(&PathRef::parse("p")).unwrap();
        assert_eq!(latest.content.as_deref(), Some("b"));
        let first = repo.get_doc_and_meta(&PathRef::parse("p@1")).unwrap();
        assert_eq!(first.content.as_deref(), Some("a"));
        let as_of = repo.get_doc_and_meta(&PathRef::parse("p@t1500")).unwrap();
        assert_eq!(as_of.version(), Some(1));
    }

    #[test]
    fn test_unversioned_rejects_version_operations() {
        let repo = unversioned();
        repo.add_document("p", "a", "u", "c", None).unwrap();

        assert!(!repo.is_versioned());
        assert!(repo.get_doc_and_meta(&PathRef::version("p", 1)).unwrap_err().is_not_supported());
        assert!(repo.revert_doc("p", None).unwrap_err().is_not_supported());
        assert!(repo
            .get_version_number_as_of_time("p", "t0")
            .unwrap_err()
            .is_not_supported());
        assert_eq!(
            repo.get_doc_and_meta(&PathRef::latest("p")).unwrap().content.as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_handler_exposes_shared_surface() {
        let repo = unversioned();
        repo.add_document("dir/a", "1", "u", "c", None).unwrap();
        repo.add_document("dir/b", "2", "u", "c", None).unwrap();

        assert_eq!(repo.authority(), "scratch");
        assert_eq!(repo.handler().document_count().unwrap(), 2);
        assert_eq!(repo.handler().get_children("dir").unwrap().len(), 2);
    }
}
