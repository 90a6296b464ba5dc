//! Batch execution of SQL statement files
//!
//! Reads statements line by line, groups them into fixed-size batches and
//! applies every batch inside one transaction that is either committed in
//! full or rolled back.

pub mod batch;
mod converter;
mod error;
#[cfg(test)]
mod test_helpers;

pub use batch::{
    BatchExecutor, ConversionSummary, DEFAULT_BATCH_SIZE, StatementBatch, StatementReader,
    format_elapsed,
};
pub use converter::Converter;
pub use error::{ExecutionError, ExecutionFailure, ExecutionPhase, RollbackStatus};
