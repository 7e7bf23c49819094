//! # Key Store Errors

use thiserror::Error;

/// Result type for key store operations
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Errors raised by a key store backend
#[derive(Debug, Clone, Error)]
pub enum KeyStoreError {
    /// The backend does not implement the requested capability
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The backend could not be reached or failed to complete the call
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

impl KeyStoreError {
    /// Create a not-supported error for the named operation
    pub fn not_supported(operation: &str) -> Self {
        KeyStoreError::NotSupported(operation.to_string())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            KeyStoreError::NotSupported(_) => "KEYSTORE_NOT_SUPPORTED",
            KeyStoreError::Backend(_) => "KEYSTORE_BACKEND_FAILURE",
            KeyStoreError::LockPoisoned => "KEYSTORE_LOCK_POISONED",
        }
    }

    /// Returns true if the error reports a missing capability
    pub fn is_not_supported(&self) -> bool {
        matches!(self, KeyStoreError::NotSupported(_))
    }
}
