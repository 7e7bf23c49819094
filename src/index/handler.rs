//! # Index Handler Contracts
//!
//! An `IndexProducer` turns a document into index rows; an `IndexHandler`
//! stores those rows and answers queries over them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::IndexResult;
use crate::meta::DocumentMetadata;

/// Column holding the document path of every index row
pub const ROW_ID: &str = "rowId";

/// One row produced for a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub values: BTreeMap<String, Value>,
}

/// Result of an index query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableQueryResult {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Builds index rows from document content
pub trait IndexProducer: Send + Sync + std::fmt::Debug {
    fn index_records(&self, path: &str, content: &str, meta: &DocumentMetadata) -> Vec<IndexRecord>;
}

/// Storage for index rows, kept in sync with document writes
pub trait IndexHandler: Send + Sync + std::fmt::Debug {
    /// A document was written; replace whatever was indexed for its path
    /// with the producer's records
    fn added_record(&self, path: &str, content: &str, meta: &DocumentMetadata) -> IndexResult<()>;

    /// A document went away; drop its rows
    fn remove_all(&self, path: &str) -> IndexResult<()>;

    /// Drop every row
    fn delete_table(&self) -> IndexResult<()>;

    fn query(&self, query: &str) -> IndexResult<TableQueryResult>;
}

/// Producer indexing selected top-level fields of JSON documents.
///
/// Non-JSON content and documents missing every field produce no rows.
#[derive(Debug, Clone)]
pub struct FieldIndexProducer {
    fields: Vec<String>,
}

impl FieldIndexProducer {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl IndexProducer for FieldIndexProducer {
    fn index_records(&self, _path: &str, content: &str, meta: &DocumentMetadata) -> Vec<IndexRecord> {
        let Ok(Value::Object(body)) = serde_json::from_str::<Value>(content) else {
            return Vec::new();
        };

        let values: BTreeMap<String, Value> = self
            .fields
            .iter()
            .filter_map(|field| body.get(field).map(|value| (field.clone(), value.clone())))
            .collect();
        if values.is_empty() {
            return Vec::new();
        }

        let mut record = IndexRecord { values };
        record
            .values
            .insert("version".to_string(), Value::from(meta.version));
        vec![record]
    }
}
