//! # Document Versioning and Metadata
//!
//! Translates logical document requests (path plus latest / version /
//! as-of) into key store operations and keeps the latest pointer in step
//! with the version chain.
//!
//! - `UnversionedMetaHandler`: latest generation only
//! - `VersionedMetaHandler`: append-only version chain with as-of reads,
//!   revert and pruning

pub mod as_of;
pub mod attributes;
pub mod clock;
pub mod errors;
pub mod handler;
pub mod metadata;
pub mod status;
mod tags;
pub mod unversioned;
pub mod versioned;

pub use as_of::{millis_directive, parse_as_of};
pub use attributes::{AttributeType, DocumentAttribute};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{MetaError, MetaResult};
pub use handler::{MetaHandler, MetaHandlerCore};
pub use metadata::{
    DocumentMetadata, DocumentWithMeta, PathRef, VersionCutoff, VersionSelector, UNVERSIONED_SENTINEL,
};
pub use status::readable_file_size;
pub use unversioned::UnversionedMetaHandler;
pub use versioned::{KeyStrategy, VersionedMetaHandler, INITIAL_VERSION};
