//! Error types for Readsync

use thiserror::Error;

/// Main error type for Readsync operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// The storage query surface failed to answer a query
    #[error("Storage error: {0}")]
    Storage(String),

    /// A query returned rows in an unexpected shape
    #[error("Query error: {0}")]
    Query(String),

    /// Persisted log database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record carried a timestamp that is not RFC 3339
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Resume point is not one of the known sync phases
    #[error("Unknown sync phase: {0}")]
    UnknownPhase(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Stable machine-readable code, used when the error is handed to the
    /// error handler.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Storage(_)
            | CoreError::Database(_)
            | CoreError::Transaction(_)
            | CoreError::Table(_)
            | CoreError::StorageOp(_)
            | CoreError::Commit(_) => "STORAGE_ERROR",
            CoreError::Query(_) => "QUERY_ERROR",
            CoreError::Serialization(_) => "SERIALIZATION_ERROR",
            CoreError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            CoreError::UnknownPhase(_) => "UNKNOWN_SYNC_PHASE",
            CoreError::InvalidConfig(_) => "INVALID_CONFIG",
            CoreError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using CoreError
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownPhase("rewinding".to_string());
        assert_eq!(format!("{}", err), "Unknown sync phase: rewinding");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }
}
