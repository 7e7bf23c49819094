//! # Key Store Layer
//!
//! Generic ordered key-value abstraction the document engine is built on.
//! Backends differ mostly in one capability: whether they keep native
//! per-cell timestamps (`supports_version_lookup_by_time`).

pub mod backend;
pub mod errors;
pub mod memory;
pub mod timestamped;

pub use backend::{extract_non_folder_keys, FolderEntry, KeyStore, KeyVisitor};
pub use errors::{KeyStoreError, KeyStoreResult};
pub use memory::MemKeyStore;
pub use timestamped::MemTimestampKeyStore;
