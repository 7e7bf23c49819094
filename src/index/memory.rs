//! # In-Memory Index
//!
//! Index rows held in a map keyed by document path, primarily for testing
//! and for the in-memory key stores. Each path has at most one row; when a
//! producer yields several records for a path the last one is kept.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::errors::{IndexError, IndexResult};
use super::handler::{IndexHandler, IndexProducer, TableQueryResult, ROW_ID};
use super::query::{compare_values, Direction, IndexQuery};
use crate::meta::DocumentMetadata;

type Row = BTreeMap<String, Value>;

#[derive(Debug)]
pub struct MemoryIndexHandler {
    producer: Arc<dyn IndexProducer>,
    rows: RwLock<BTreeMap<String, Row>>,
}

impl MemoryIndexHandler {
    pub fn new(producer: Arc<dyn IndexProducer>) -> Self {
        Self {
            producer,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_error() -> IndexError {
        IndexError::Backend("Lock poisoned".to_string())
    }
}

impl IndexHandler for MemoryIndexHandler {
    fn added_record(&self, path: &str, content: &str, meta: &DocumentMetadata) -> IndexResult<()> {
        let records = self.producer.index_records(path, content, meta);
        let mut rows = self.rows.write().map_err(|_| Self::lock_error())?;
        rows.remove(path);
        for record in records {
            let mut values = record.values;
            values.insert(ROW_ID.to_string(), Value::from(path));
            rows.insert(path.to_string(), values);
        }
        Ok(())
    }

    fn remove_all(&self, path: &str) -> IndexResult<()> {
        self.rows
            .write()
            .map_err(|_| Self::lock_error())?
            .remove(path);
        Ok(())
    }

    fn delete_table(&self) -> IndexResult<()> {
        tracing::info!(event = "index_table_deleted", "Removing index content");
        self.rows.write().map_err(|_| Self::lock_error())?.clear();
        Ok(())
    }

    fn query(&self, query: &str) -> IndexResult<TableQueryResult> {
        let parsed = IndexQuery::parse(query)?;
        let rows = self.rows.read().map_err(|_| Self::lock_error())?;

        let mut matching: Vec<&Row> = rows
            .values()
            .filter(|row| {
                parsed
                    .conditions
                    .iter()
                    .all(|condition| condition.matches(row.get(&condition.field)))
            })
            .collect();

        if let Some((field, direction)) = &parsed.order_by {
            matching.sort_by(|left, right| {
                let ordering = match (left.get(field), right.get(field)) {
                    (Some(l), Some(r)) => compare_values(l, r),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        let mut projected: Vec<Vec<Value>> = Vec::new();
        for row in matching {
            let values: Vec<Value> = parsed
                .columns
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                .collect();
            if parsed.distinct && projected.contains(&values) {
                continue;
            }
            projected.push(values);
        }

        let limit = parsed.limit.unwrap_or(usize::MAX);
        Ok(TableQueryResult {
            column_names: parsed.columns,
            rows: projected.into_iter().skip(parsed.skip).take(limit).collect(),
        })
    }
}
