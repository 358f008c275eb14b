//! Storage layer error types
//!
//! All errors that can occur while talking to the relational backend are
//! defined here. Domain-level failures (missing branch, nothing to commit)
//! live in the catalog layer.

use thiserror::Error;

use crate::transaction::Interrupt;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from SQLite that has not been attributed to an operation yet
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// error from SQLite, tagged with the catalog operation that hit it
    #[error("{operation}: sqlite error: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// JSON serialization or deserialization of a metadata column failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// a persisted row violates an invariant the schema cannot express
    #[error("corrupted data in {table}: {reason}")]
    CorruptedData { table: &'static str, reason: String },

    /// the caller's context was cancelled or its deadline passed
    #[error("operation interrupted: {0}")]
    Interrupted(#[from] Interrupt),
}

impl StorageError {
    /// attribute an untagged SQLite failure to a catalog operation
    pub fn in_operation(self, operation: &'static str) -> Self {
        match self {
            StorageError::Sqlite(source) => StorageError::Backend { operation, source },
            other => other,
        }
    }

    /// check if the error came from a cancelled or expired context
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StorageError::Interrupted(_))
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        let source = match self {
            StorageError::Sqlite(e) | StorageError::Backend { source: e, .. } => e,
            _ => return false,
        };
        matches!(
            source.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
