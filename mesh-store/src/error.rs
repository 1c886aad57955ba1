//! Error types for mesh-store.

use mesh_types::ErrorKind;
use thiserror::Error;

/// Local persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored document could not be encoded or decoded.
    #[error("corrupt {collection} document: {source}")]
    Document {
        /// Collection the document belongs to.
        collection: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A record violates an invariant and was refused.
    #[error("invalid {collection} record: {reason}")]
    Invalid {
        /// Collection the record was written to.
        collection: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Update of a record that does not exist.
    #[error("{collection} record not found: {key}")]
    NotFound {
        /// Collection searched.
        collection: &'static str,
        /// Missing key.
        key: String,
    },
}

impl StorageError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StorageFailure
    }

    pub(crate) fn document(collection: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| StorageError::Document { collection, source }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
