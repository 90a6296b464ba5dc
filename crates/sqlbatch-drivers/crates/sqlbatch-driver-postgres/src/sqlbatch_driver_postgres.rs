//! PostgreSQL driver implementation

mod connection;
mod driver;

pub use connection::{PostgresConnection, PostgresTransaction, SessionOptions, SslMode};
pub use driver::PostgresDriver;
