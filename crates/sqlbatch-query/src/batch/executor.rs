//! Transactional batch executor
//!
//! A run opens one connection, starts one transaction and streams the input
//! file through a [`StatementBatch`]. Every full batch is executed right away,
//! the remainder is executed at end of input, and the transaction is committed.
//! Any failure after the transaction started rolls it back. The connection is
//! closed on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlbatch_core::{Connection, ConnectionFactory, Transaction, total_affected_rows};
use tokio::io::AsyncBufRead;

use super::{StatementBatch, StatementReader};
use crate::{Converter, ExecutionError, ExecutionFailure, RollbackStatus};

/// Batch size used when none is configured
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Totals of a committed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Non-blank statements executed
    pub statements: usize,
    /// Batches sent to the database, the final partial one included
    pub batches: usize,
    pub affected_rows: u64,
    pub elapsed: Duration,
}

/// Render a duration as whole minutes and seconds, e.g. "2 minutes, 5 seconds"
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{} minutes, {} seconds", secs / 60, secs % 60)
}

/// Executes a statement file against a database in fixed-size batches
pub struct BatchExecutor {
    factory: Arc<dyn ConnectionFactory>,
    batch_size: usize,
    url: Option<String>,
    input: Option<PathBuf>,
}

impl BatchExecutor {
    /// Create an executor that opens connections through `factory`
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        batch_size: usize,
    ) -> Result<Self, ExecutionError> {
        if batch_size == 0 {
            return Err(ExecutionError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            factory,
            batch_size,
            url: None,
            input: None,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    async fn run(
        &self,
        connection: &Arc<dyn Connection>,
        input: &Path,
    ) -> Result<ConversionSummary, ExecutionFailure> {
        let transaction = connection
            .begin_transaction()
            .await
            .map_err(ExecutionError::Transaction)?;
        let mut session = ExecutionSession::new(transaction, self.batch_size);

        let outcome = match StatementReader::open(input).await {
            Ok(mut reader) => session.apply(&mut reader).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => Ok(session.summary()),
            Err(error) => {
                tracing::error!(phase = %error.phase(), error = %error, "batch execution failed");
                let rollback = session.rollback().await;
                Err(ExecutionFailure::new(error, rollback))
            }
        }
    }
}

async fn close_connection(connection: &Arc<dyn Connection>) {
    match connection.close().await {
        Ok(()) => tracing::debug!("connection closed"),
        Err(e) => tracing::error!(error = %e, "failed to close connection"),
    }
}

#[async_trait]
impl Converter for BatchExecutor {
    async fn convert(&self) -> Result<ConversionSummary, ExecutionFailure> {
        let url = self
            .url
            .as_deref()
            .ok_or(ExecutionError::MissingConfiguration("connection url"))?;
        let input = self
            .input
            .as_deref()
            .ok_or(ExecutionError::MissingConfiguration("input file"))?;

        let started = Instant::now();
        tracing::info!(input = %input.display(), batch_size = self.batch_size, "executing SQL statements");

        let connection = self
            .factory
            .open(url)
            .await
            .map_err(ExecutionError::Connection)?;
        tracing::debug!(driver = %connection.driver_name(), "connected to database");

        let result = self.run(&connection, input).await;
        close_connection(&connection).await;

        let summary = ConversionSummary {
            elapsed: started.elapsed(),
            ..result?
        };
        tracing::info!(
            statements = summary.statements,
            batches = summary.batches,
            affected_rows = summary.affected_rows,
            "batch execution finished in {}",
            format_elapsed(summary.elapsed)
        );
        Ok(summary)
    }

    fn set_url(&mut self, url: &str) {
        self.url = Some(url.to_string());
    }

    fn set_input(&mut self, input: &Path) {
        self.input = Some(input.to_path_buf());
    }
}

/// State of one run between `begin_transaction` and commit or rollback
struct ExecutionSession {
    transaction: Box<dyn Transaction>,
    batch: StatementBatch,
    statements: usize,
    batches: usize,
    affected_rows: u64,
}

impl ExecutionSession {
    fn new(transaction: Box<dyn Transaction>, batch_size: usize) -> Self {
        Self {
            transaction,
            batch: StatementBatch::new(batch_size),
            statements: 0,
            batches: 0,
            affected_rows: 0,
        }
    }

    /// Stream every statement through the batch, then commit
    async fn apply<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: &mut StatementReader<R>,
    ) -> Result<(), ExecutionError> {
        while let Some(statement) = reader.next_statement().await? {
            self.statements += 1;
            if self.batch.push(statement) {
                self.flush().await?;
            }
        }
        self.flush().await?;

        self.transaction
            .commit()
            .await
            .map_err(ExecutionError::Commit)?;
        tracing::debug!(statements = self.statements, "transaction committed");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ExecutionError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let statements = self.batch.take();
        self.batches += 1;

        let results = self
            .transaction
            .execute_batch(&statements)
            .await
            .map_err(|source| ExecutionError::StatementExecution {
                batch: self.batches,
                source,
            })?;
        self.affected_rows += total_affected_rows(&results);
        tracing::debug!(batch = self.batches, "flushed {} statements", statements.len());
        Ok(())
    }

    async fn rollback(&mut self) -> RollbackStatus {
        match self.transaction.rollback().await {
            Ok(()) => {
                tracing::debug!("transaction rolled back, changes to the database have been reverted");
                RollbackStatus::RolledBack
            }
            Err(e) => {
                tracing::error!(error = %e, "rollback failed");
                RollbackStatus::Failed(e.to_string())
            }
        }
    }

    fn summary(&self) -> ConversionSummary {
        ConversionSummary {
            statements: self.statements,
            batches: self.batches,
            affected_rows: self.affected_rows,
            elapsed: Duration::ZERO,
        }
    }
}
