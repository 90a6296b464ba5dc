//! Database driver trait definition

use crate::{Connection, Result, SqlBatchError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Prefix accepted in front of any connection URL, e.g. `jdbc:sqlite:data.db`
pub const JDBC_PREFIX: &str = "jdbc:";

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver, also the URL scheme it answers to
    fn name(&self) -> &'static str;

    /// Additional URL schemes handled by this driver
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Connection string format help text
    fn connection_string_help(&self) -> &'static str {
        ""
    }

    /// Parse a connection URL into a configuration
    fn parse_connection_string(&self, _conn_str: &str) -> Result<ConnectionConfig> {
        Err(SqlBatchError::NotSupported(format!(
            "connection string parsing not implemented for driver '{}'",
            self.name()
        )))
    }

    /// Build a connection URL from configuration
    fn build_connection_string(&self, config: &ConnectionConfig) -> String;

    /// Create a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;
}

/// Connection configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Driver ID (e.g., "postgres", "sqlite")
    pub driver: String,
    /// Host address (empty for file-based databases)
    pub host: String,
    /// Port number (0 for default or file-based)
    pub port: u16,
    /// Database name or file path
    pub database: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Additional connection parameters (URL query pairs)
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Create a new configuration with default values
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            ..Self::default()
        }
    }

    /// Create a SQLite configuration
    pub fn new_sqlite(database_path: &str) -> Self {
        let mut config = Self::new("sqlite");
        config.database = Some(database_path.to_string());
        config
    }

    /// Get a string parameter
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Some(val) = self.params.get(key) {
            return Some(val.clone());
        }
        match key {
            "host" if !self.host.is_empty() => Some(self.host.clone()),
            "database" | "path" => self.database.clone(),
            "username" | "user" => self.username.clone(),
            "password" => self.password.clone(),
            _ => None,
        }
    }
}

/// Strip an optional `jdbc:` prefix from a connection URL
pub fn strip_jdbc_prefix(url: &str) -> &str {
    let trimmed = url.trim();
    match trimmed.get(..JDBC_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(JDBC_PREFIX) => &trimmed[JDBC_PREFIX.len()..],
        _ => trimmed,
    }
}

/// Lower-cased scheme of a connection URL (`postgres` for `postgres://...`)
pub fn connection_scheme(url: &str) -> Option<String> {
    let url = strip_jdbc_prefix(url);
    let (scheme, _) = url.split_once(':')?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}
