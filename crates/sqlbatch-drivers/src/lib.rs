//! sqlbatch drivers - concrete database drivers and the registry that picks
//! one from a connection URL.

#[cfg(feature = "postgres")]
pub use sqlbatch_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use sqlbatch_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from sqlbatch-core
pub use sqlbatch_core::{
    Connection, ConnectionConfig, ConnectionFactory, DatabaseDriver, Result, SqlBatchError,
    StatementResult, Transaction,
};
