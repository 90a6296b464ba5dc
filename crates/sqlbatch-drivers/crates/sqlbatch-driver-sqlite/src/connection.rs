//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags};
use sqlbatch_core::{Connection, Result, SqlBatchError, StatementResult, Transaction};
use std::sync::Arc;

type SharedHandle = Arc<Mutex<Option<RusqliteConnection>>>;

/// SQLite connection wrapper
///
/// The handle is shared with any open [`SqliteTransaction`]; `close` takes it
/// out so every later call fails instead of touching a closed database.
pub struct SqliteConnection {
    conn: SharedHandle,
    path: String,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        // Expand path to handle ~ and relative paths
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                SqlBatchError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            // Validate that parent directory exists for non-URI paths
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent() {
                    if !parent.exists() {
                        return Err(SqlBatchError::Connection(format!(
                            "Parent directory does not exist: {}",
                            parent.display()
                        )));
                    }
                }
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                SqlBatchError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            SqlBatchError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: expanded_path,
        })
    }

    /// Expand path to handle ~ (home directory) and relative paths
    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                let home_path = std::path::PathBuf::from(home);
                home_path.join(rest).to_string_lossy().to_string()
            } else {
                return Err(SqlBatchError::Configuration(
                    "Unable to determine HOME directory".into(),
                ));
            }
        } else if path.starts_with('~') {
            return Err(SqlBatchError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        let result = if path_buf.is_relative() {
            std::env::current_dir()
                .map_err(SqlBatchError::Io)?
                .join(path_buf)
                .to_string_lossy()
                .to_string()
        } else {
            expanded
        };

        Ok(result)
    }

    /// Resolved database path (`:memory:` for in-memory databases)
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Run `f` against the handle, failing if the connection has been closed
fn with_open<T>(
    handle: &SharedHandle,
    f: impl FnOnce(&RusqliteConnection) -> Result<T>,
) -> Result<T> {
    let guard = handle.lock();
    let conn = guard
        .as_ref()
        .ok_or_else(|| SqlBatchError::Connection("SQLite connection is closed".into()))?;
    f(conn)
}

fn execute_statement(handle: &SharedHandle, sql: &str) -> Result<StatementResult> {
    with_open(handle, |conn| {
        let rows_affected = conn
            .execute(sql, [])
            .map_err(|e| SqlBatchError::Query(format!("Failed to execute statement: {}", e)))?;
        Ok(StatementResult::new(rows_affected as u64))
    })
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        let result = execute_statement(&self.conn, sql)?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning SQLite transaction");
        with_open(&self.conn, |conn| {
            // DEFERRED means the write lock is only acquired when the first write occurs
            conn.execute_batch("BEGIN DEFERRED").map_err(|e| {
                SqlBatchError::Transaction(format!("Failed to begin transaction: {}", e))
            })
        })?;
        tracing::debug!("SQLite transaction started");
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            state: TransactionState::Active,
        }))
    }

    async fn close(&self) -> Result<()> {
        let taken = self.conn.lock().take();
        let Some(conn) = taken else {
            tracing::debug!(path = %self.path, "SQLite connection already closed");
            return Ok(());
        };

        tracing::info!(path = %self.path, "closing SQLite connection");
        conn.close().map_err(|(conn, e)| {
            // Put the handle back so the connection is not silently leaked
            *self.conn.lock() = Some(conn);
            SqlBatchError::Connection(format!("Failed to close SQLite connection: {}", e))
        })
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Active,
    Committed,
    RolledBack,
    RollbackFailed,
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL so that it can share
/// the connection handle without rusqlite's borrow-based transaction lifetime.
pub struct SqliteTransaction {
    conn: SharedHandle,
    state: TransactionState,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }
        tracing::warn!("SQLite transaction dropped without commit or rollback, issuing automatic rollback");
        let guard = self.conn.lock();
        if let Some(conn) = guard.as_ref() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        if self.state != TransactionState::Active {
            return Err(SqlBatchError::Transaction("Transaction is no longer active".into()));
        }

        let result = execute_statement(&self.conn, sql)?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed in SQLite transaction");
        Ok(result)
    }

    async fn commit(&mut self) -> Result<()> {
        tracing::debug!("committing SQLite transaction");
        match self.state {
            TransactionState::Active => {}
            TransactionState::Committed => {
                return Err(SqlBatchError::Transaction("Transaction already committed".into()));
            }
            TransactionState::RolledBack | TransactionState::RollbackFailed => {
                return Err(SqlBatchError::Transaction("Transaction already rolled back".into()));
            }
        }

        with_open(&self.conn, |conn| {
            conn.execute_batch("COMMIT").map_err(|e| {
                SqlBatchError::Transaction(format!("Failed to commit transaction: {}", e))
            })
        })?;

        self.state = TransactionState::Committed;
        tracing::debug!("SQLite transaction committed successfully");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");
        match self.state {
            TransactionState::Committed => {
                return Err(SqlBatchError::Transaction("Transaction already committed".into()));
            }
            TransactionState::RolledBack => return Ok(()),
            TransactionState::Active | TransactionState::RollbackFailed => {}
        }

        let outcome = with_open(&self.conn, |conn| {
            conn.execute_batch("ROLLBACK").map_err(|e| {
                SqlBatchError::Transaction(format!("Failed to rollback transaction: {}", e))
            })
        });

        self.state = match outcome {
            Ok(()) => TransactionState::RolledBack,
            Err(_) => TransactionState::RollbackFailed,
        };
        outcome?;

        tracing::debug!("SQLite transaction rolled back successfully");
        Ok(())
    }
}
