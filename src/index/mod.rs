//! # Secondary Index
//!
//! Optional index kept in step with document writes and deletes. The meta
//! handlers only see the `IndexHandler`/`IndexProducer` traits.

pub mod errors;
pub mod handler;
pub mod memory;
pub mod query;

pub use errors::{IndexError, IndexResult};
pub use handler::{FieldIndexProducer, IndexHandler, IndexProducer, IndexRecord, TableQueryResult, ROW_ID};
pub use memory::MemoryIndexHandler;
pub use query::IndexQuery;
