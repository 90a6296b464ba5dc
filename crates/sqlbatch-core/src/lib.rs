//! sqlbatch core - abstractions shared by the batch executor and the drivers
//!
//! This crate defines the capability set the executor relies on, without
//! depending on any particular database engine:
//!
//! - `DatabaseDriver` - parses a connection URL and opens connections
//! - `Connection` - a live connection that can start a transaction and be closed
//! - `Transaction` - executes statement batches, commits or rolls back
//! - `ConnectionFactory` - opens a connection straight from a URL

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
