//! Error types for sqlbatch drivers

use thiserror::Error;

/// Error raised by drivers and connections
#[derive(Error, Debug)]
pub enum SqlBatchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// A statement inside a batch failed. `index` is the 0-based position in the batch.
    #[error("statement #{} of batch failed ({sql}): {message}", .index + 1)]
    Statement {
        index: usize,
        sql: String,
        message: String,
    },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, SqlBatchError>;
