//! # Document Metadata
//!
//! Provenance records for one generation of a document, and the request /
//! response shapes used by batch reads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version pinned on every record written by the unversioned policy
pub const UNVERSIONED_SENTINEL: i32 = -1;

/// Metadata describing one version of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub version: i32,
    /// Epoch millis of the first write; never changes afterwards
    pub created_timestamp: i64,
    /// Epoch millis of the write or delete that produced this record
    pub modified_timestamp: i64,
    pub user: String,
    pub comment: String,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, Value>,
}

impl DocumentMetadata {
    /// Metadata for the first generation of a document
    pub fn initial(version: i32, user: &str, comment: &str, now: i64) -> Self {
        Self {
            version,
            created_timestamp: now,
            modified_timestamp: now,
            user: user.to_string(),
            comment: comment.to_string(),
            deleted: false,
            tags: Map::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Content and metadata of one resolved document reference. Both are
/// `None` when the reference does not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWithMeta {
    pub display_name: String,
    pub content: Option<String>,
    pub metadata: Option<DocumentMetadata>,
}

impl DocumentWithMeta {
    pub fn new(path: &str, content: Option<String>, metadata: Option<DocumentMetadata>) -> Self {
        Self {
            display_name: path.to_string(),
            content,
            metadata,
        }
    }

    /// Placeholder for a reference that does not resolve
    pub fn absent(path: &str) -> Self {
        Self::new(path, None, None)
    }

    pub fn is_absent(&self) -> bool {
        self.content.is_none() && self.metadata.is_none()
    }

    pub fn version(&self) -> Option<i32> {
        self.metadata.as_ref().map(|meta| meta.version)
    }
}

/// Which generation of a path a read wants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    Latest,
    Version(i32),
    /// As-of directive, see [`crate::meta::as_of`]
    AsOf(String),
}

/// A logical document reference: a path plus a version selector.
///
/// The text form is `path`, `path@<version>` or `path@<as-of directive>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathRef {
    pub path: String,
    pub selector: VersionSelector,
}

impl PathRef {
    pub fn latest(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            selector: VersionSelector::Latest,
        }
    }

    pub fn version(path: impl Into<String>, version: i32) -> Self {
        Self {
            path: path.into(),
            selector: VersionSelector::Version(version),
        }
    }

    pub fn as_of(path: impl Into<String>, directive: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            selector: VersionSelector::AsOf(directive.into()),
        }
    }

    pub fn parse(reference: &str) -> Self {
        match reference.rsplit_once('@') {
            Some((path, qualifier)) if !qualifier.is_empty() => match qualifier.parse::<i32>() {
                Ok(version) => Self::version(path, version),
                Err(_) => Self::as_of(path, qualifier),
            },
            _ => Self::latest(reference),
        }
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            VersionSelector::Latest => write!(f, "{}", self.path),
            VersionSelector::Version(version) => write!(f, "{}@{}", self.path, version),
            VersionSelector::AsOf(directive) => write!(f, "{}@{}", self.path, directive),
        }
    }
}

/// Retention cutoff for pruning a version chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCutoff {
    /// Every version numbered at or below this one
    Version(i32),
    /// Every version modified at or before this epoch millis
    Timestamp(i64),
}
