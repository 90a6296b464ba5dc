//! Batch execution module
//!
//! Statements are read one per line, buffered into fixed-size batches and
//! executed inside a single transaction.

mod executor;
mod reader;
mod statement_batch;
#[cfg(test)]
mod tests;

pub use executor::{BatchExecutor, ConversionSummary, DEFAULT_BATCH_SIZE, format_elapsed};
pub use reader::StatementReader;
pub use statement_batch::StatementBatch;
