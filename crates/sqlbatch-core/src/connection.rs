//! Connection and transaction traits

use crate::{Result, SqlBatchError, StatementResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgres")
    fn driver_name(&self) -> &str;

    /// Execute a single statement outside of any explicit transaction
    async fn execute(&self, sql: &str) -> Result<StatementResult>;

    /// Begin a transaction, turning autocommit off until it is committed or rolled back
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection, releasing the underlying handle
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction
///
/// Commit and rollback take `&mut self` so a caller can still roll back
/// after a failed commit.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Execute a statement within the transaction
    async fn execute(&self, sql: &str) -> Result<StatementResult>;

    /// Execute statements in order as one batch.
    ///
    /// Stops at the first failing statement and reports its position in the
    /// batch through [`SqlBatchError::Statement`]. An empty batch is a no-op.
    async fn execute_batch(&self, statements: &[String]) -> Result<Vec<StatementResult>> {
        let mut results = Vec::with_capacity(statements.len());
        for (index, sql) in statements.iter().enumerate() {
            let result = self
                .execute(sql)
                .await
                .map_err(|e| SqlBatchError::Statement {
                    index,
                    sql: sql.clone(),
                    message: e.to_string(),
                })?;
            results.push(result);
        }
        Ok(results)
    }

    /// Commit the transaction
    async fn commit(&mut self) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(&mut self) -> Result<()>;
}

/// Opens connections from a connection URL.
///
/// Implemented by the driver registry; the executor only sees this trait.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn Connection>>;
}
