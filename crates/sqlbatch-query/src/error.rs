//! Batch execution errors

use sqlbatch_core::SqlBatchError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stage of a run in which an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Configure,
    Connect,
    Read,
    Execute,
    Commit,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configure => "configure",
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Execute => "execute",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Outcome of the rollback attempted after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackStatus {
    /// No transaction was open when the run failed
    NotAttempted,
    RolledBack,
    Failed(String),
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAttempted => f.write_str("no rollback needed"),
            Self::RolledBack => f.write_str("changes rolled back"),
            Self::Failed(message) => write!(f, "rollback failed: {}", message),
        }
    }
}

/// Errors raised while running a batch file
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    #[error("{0} is not configured")]
    MissingConfiguration(&'static str),

    #[error("could not connect to the database: {0}")]
    Connection(#[source] SqlBatchError),

    #[error("could not start a transaction: {0}")]
    Transaction(#[source] SqlBatchError),

    #[error("input file {} could not be opened: {source}", .path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read line {line} of the input: {source}")]
    InputRead {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("batch {batch} failed: {source}")]
    StatementExecution {
        /// 1-based number of the failing batch
        batch: usize,
        #[source]
        source: SqlBatchError,
    },

    #[error("commit failed: {0}")]
    Commit(#[source] SqlBatchError),
}

impl ExecutionError {
    /// The phase this error belongs to
    pub fn phase(&self) -> ExecutionPhase {
        match self {
            Self::InvalidBatchSize(_) | Self::MissingConfiguration(_) => ExecutionPhase::Configure,
            Self::Connection(_) | Self::Transaction(_) => ExecutionPhase::Connect,
            Self::InputNotFound { .. } | Self::InputRead { .. } => ExecutionPhase::Read,
            Self::StatementExecution { .. } => ExecutionPhase::Execute,
            Self::Commit(_) => ExecutionPhase::Commit,
        }
    }
}

/// A failed run: the error that stopped it and what happened to the transaction
#[derive(Debug, Error)]
#[error("{phase} phase failed ({rollback}): {error}", phase = .error.phase())]
pub struct ExecutionFailure {
    #[source]
    pub error: ExecutionError,
    pub rollback: RollbackStatus,
}

impl ExecutionFailure {
    pub fn new(error: ExecutionError, rollback: RollbackStatus) -> Self {
        Self { error, rollback }
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.error.phase()
    }

    /// Whether uncommitted work may still be on the server
    pub fn rollback_failed(&self) -> bool {
        matches!(self.rollback, RollbackStatus::Failed(_))
    }
}

impl From<ExecutionError> for ExecutionFailure {
    fn from(error: ExecutionError) -> Self {
        Self::new(error, RollbackStatus::NotAttempted)
    }
}
