//! SQLite driver implementation

use async_trait::async_trait;
use sqlbatch_core::{
    Connection, ConnectionConfig, DatabaseDriver, Result, SqlBatchError, strip_jdbc_prefix,
};
use std::sync::Arc;

use crate::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["sqlite3"]
    }

    fn connection_string_help(&self) -> &'static str {
        "sqlite:///absolute/path.db, sqlite://relative.db or sqlite::memory:"
    }

    fn parse_connection_string(&self, conn_str: &str) -> Result<ConnectionConfig> {
        let url = strip_jdbc_prefix(conn_str);
        let (scheme, rest) = url.split_once(':').ok_or_else(|| {
            SqlBatchError::Configuration(format!("'{}' is not a SQLite connection URL", url))
        })?;
        if !(scheme.eq_ignore_ascii_case(self.name())
            || self.aliases().iter().any(|a| scheme.eq_ignore_ascii_case(a)))
        {
            return Err(SqlBatchError::Configuration(format!(
                "unsupported scheme '{}' for the SQLite driver",
                scheme
            )));
        }

        // `sqlite:///abs.db` and `sqlite://rel.db` carry an authority marker, `sqlite:rel.db` does not
        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            return Err(SqlBatchError::Configuration(format!(
                "SQLite URL '{}' does not name a database file. Expected {}",
                url,
                self.connection_string_help()
            )));
        }

        Ok(ConnectionConfig::new_sqlite(path))
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        let path = config
            .get_string("path")
            .unwrap_or_else(|| ":memory:".to_string());
        if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", path)
        }
    }

    #[tracing::instrument(skip(self, config), fields(path = config.get_string("path").as_deref()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let path = config.get_string("path").ok_or_else(|| {
            SqlBatchError::Configuration(
                "SQLite requires a database path, e.g. sqlite:///path/to/database.db".into(),
            )
        })?;

        let conn = SqliteConnection::open(&path).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            SqlBatchError::Connection(format!("Failed to connect to SQLite database: {}", e))
        })?;

        tracing::info!(path = %conn.path(), "SQLite connection created");
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_path() {
        let config = SqliteDriver::new()
            .parse_connection_string("sqlite:///var/lib/app.db")
            .unwrap();

        assert_eq!(config.driver, "sqlite");
        assert_eq!(config.database.as_deref(), Some("/var/lib/app.db"));
    }

    #[test]
    fn test_parse_relative_and_memory_paths() {
        let driver = SqliteDriver::new();

        let relative = driver.parse_connection_string("sqlite://data/app.db").unwrap();
        assert_eq!(relative.database.as_deref(), Some("data/app.db"));

        let bare = driver.parse_connection_string("sqlite3:app.db").unwrap();
        assert_eq!(bare.database.as_deref(), Some("app.db"));

        let memory = driver.parse_connection_string("jdbc:sqlite::memory:").unwrap();
        assert_eq!(memory.database.as_deref(), Some(":memory:"));
    }

    #[test]
    fn test_parse_rejects_foreign_scheme_and_empty_path() {
        let driver = SqliteDriver::new();

        assert!(driver.parse_connection_string("postgres://localhost/db").is_err());
        assert!(driver.parse_connection_string("sqlite://").is_err());
        assert!(driver.parse_connection_string("data.db").is_err());
    }

    #[test]
    fn test_build_connection_string_round_trips() {
        let driver = SqliteDriver::new();

        for url in ["sqlite:///tmp/app.db", "sqlite://app.db", "sqlite::memory:"] {
            let config = driver.parse_connection_string(url).unwrap();
            assert_eq!(driver.build_connection_string(&config), url);
        }
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let driver = SqliteDriver::new();
        let config = driver.parse_connection_string("sqlite::memory:").unwrap();

        let conn = driver.connect(&config).await.unwrap();

        assert_eq!(conn.driver_name(), "sqlite");
        conn.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());
    }
}
