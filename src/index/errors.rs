//! # Index Errors

use thiserror::Error;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Secondary index errors
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Query string could not be parsed
    #[error("Invalid index query: {0}")]
    InvalidQuery(String),

    /// Index storage failed
    #[error("Index backend error: {0}")]
    Backend(String),
}

impl IndexError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::InvalidQuery(_) => "INDEX_INVALID_QUERY",
            IndexError::Backend(_) => "INDEX_BACKEND_FAILURE",
        }
    }
}
