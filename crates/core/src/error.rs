//! Error types for Dash document access.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = core::result::Result<T, StoreError>;

/// Errors reported by the document store.
///
/// Listener errors are delivered to every affected listener, so the type is
/// cloneable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The caller is not allowed to read the target.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The read target does not exist where existence is required.
    #[error("not found: {0}")]
    NotFound(String),
    /// The query cannot be evaluated.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Internal store failure.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a permission denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        StoreError::PermissionDenied(message.into())
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        StoreError::InvalidQuery(message.into())
    }
}

/// Errors produced while turning a document into an application type.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The document does not exist, so there is nothing to decode.
    #[error("document {path} does not exist")]
    Missing { path: String },
    /// The fields do not match the target type.
    #[error("failed to decode document {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A required field is absent or has the wrong type.
    #[error("document {path} has invalid field `{field}`")]
    InvalidField { path: String, field: String },
}
