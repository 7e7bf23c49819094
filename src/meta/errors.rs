//! # Meta Handler Errors

use thiserror::Error;

use crate::index::IndexError;
use crate::keystore::KeyStoreError;

/// Result type for meta handler operations
pub type MetaResult<T> = Result<T, MetaError>;

/// Errors raised by the document versioning engine
#[derive(Debug, Error)]
pub enum MetaError {
    /// Backend failure, propagated without retry
    #[error(transparent)]
    Store(#[from] KeyStoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// Stored metadata could not be (de)serialized
    #[error("Metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation needs a capability this handler does not have
    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Invalid as-of time '{0}', expected t<millis>, yyyyMMdd'T'HHmmss or yyyyMMdd'T'HHmmssZ")]
    InvalidAsOfTime(String),

    /// The document did not exist at the requested instant
    #[error("Cannot calculate version of {path} as of {as_of}")]
    IncalculableVersion { path: String, as_of: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("No previous version to revert to for {0}")]
    NoPreviousVersion(String),

    #[error("Unknown attribute type: {0}")]
    UnknownAttributeType(String),

    #[error("Invalid tag path: {0}")]
    InvalidTagPath(String),
}

impl MetaError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            MetaError::Store(inner) => inner.code(),
            MetaError::Index(inner) => inner.code(),
            MetaError::Serialization(_) => "META_SERIALIZATION_FAILED",
            MetaError::Unsupported(_) => "META_NOT_SUPPORTED",
            MetaError::InvalidAsOfTime(_) => "META_INVALID_AS_OF_TIME",
            MetaError::IncalculableVersion { .. } => "META_INCALCULABLE_VERSION",
            MetaError::DocumentNotFound(_) => "META_DOCUMENT_NOT_FOUND",
            MetaError::NoPreviousVersion(_) => "META_NO_PREVIOUS_VERSION",
            MetaError::UnknownAttributeType(_) => "META_UNKNOWN_ATTRIBUTE_TYPE",
            MetaError::InvalidTagPath(_) => "META_INVALID_TAG_PATH",
        }
    }

    /// True for both handler-level and backend-level capability failures
    pub fn is_not_supported(&self) -> bool {
        match self {
            MetaError::Unsupported(_) => true,
            MetaError::Store(inner) => inner.is_not_supported(),
            _ => false,
        }
    }
}
