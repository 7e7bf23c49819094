//! vellum - A backend-agnostic logical document store
//!
//! Documents live at slash-delimited paths inside an authority. Every write
//! is recorded with provenance metadata; versioned repositories keep the
//! whole history and answer as-of reads.
//!
//! - `keystore`: the key-value contract backends implement
//! - `index`: optional secondary index kept in step with writes
//! - `meta`: versioning and metadata engine
//! - `repo`, `config`: repository wrapper and its configuration

pub mod config;
pub mod index;
pub mod keystore;
pub mod meta;
pub mod repo;

pub use config::{ConfigError, RepoConfig};
pub use meta::{DocumentMetadata, DocumentWithMeta, MetaError, MetaHandler, MetaResult, PathRef};
pub use repo::{Policy, Repository};
