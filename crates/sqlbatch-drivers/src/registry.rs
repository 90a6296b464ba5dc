//! Driver registry for managing available database drivers

use async_trait::async_trait;
use sqlbatch_core::{
    Connection, ConnectionFactory, DatabaseDriver, Result, SqlBatchError, connection_scheme,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers, keyed by name and URL scheme
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
    aliases: HashMap<String, String>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));

        registry
    }

    /// Register a new driver under its name and aliases
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering database driver");
        for alias in driver.aliases() {
            self.aliases.insert(alias.to_ascii_lowercase(), name.clone());
        }
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name or alias
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let key = name.to_ascii_lowercase();
        let canonical = self.aliases.get(&key).unwrap_or(&key);
        let driver = self.drivers.get(canonical).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered under this name or alias
    pub fn has(&self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        self.drivers.contains_key(&key) || self.aliases.contains_key(&key)
    }

    /// Find the driver responsible for a connection URL
    pub fn resolve(&self, url: &str) -> Result<Arc<dyn DatabaseDriver>> {
        let scheme = connection_scheme(url).ok_or_else(|| {
            SqlBatchError::Configuration(
                "connection URL has no scheme, expected e.g. sqlite:///path.db or postgres://host/db"
                    .into(),
            )
        })?;

        self.get(&scheme).ok_or_else(|| {
            SqlBatchError::NotFound(format!(
                "no driver for scheme '{}' (available: {})",
                scheme,
                self.list().join(", ")
            ))
        })
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl ConnectionFactory for DriverRegistry {
    async fn open(&self, url: &str) -> Result<Arc<dyn Connection>> {
        let driver = self.resolve(url)?;
        // The URL may carry a password, so only the driver is logged
        tracing::debug!(driver = %driver.name(), "opening connection");
        let config = driver.parse_connection_string(url)?;
        driver.connect(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = DriverRegistry::new();

        assert!(registry.list().is_empty());
        assert!(!registry.has("sqlite"));
        assert!(registry.get("sqlite").is_none());
    }

    #[cfg(all(feature = "sqlite", feature = "postgres"))]
    #[test]
    fn test_defaults_register_names_and_aliases() {
        let registry = DriverRegistry::with_defaults();

        assert_eq!(registry.list(), vec!["postgres", "sqlite"]);
        assert!(registry.has("postgresql"));
        assert!(registry.has("SQLite3"));
        assert_eq!(registry.get("postgresql").map(|d| d.name()), Some("postgres"));
    }

    #[cfg(all(feature = "sqlite", feature = "postgres"))]
    #[test]
    fn test_resolve_by_scheme() {
        let registry = DriverRegistry::with_defaults();

        let sqlite = registry.resolve("jdbc:sqlite:data.db").unwrap();
        assert_eq!(sqlite.name(), "sqlite");

        let postgres = registry.resolve("postgresql://localhost/app").unwrap();
        assert_eq!(postgres.name(), "postgres");
    }

    #[test]
    fn test_resolve_errors() {
        let registry = DriverRegistry::with_defaults();

        assert!(matches!(
            registry.resolve("/tmp/data.db"),
            Err(SqlBatchError::Configuration(_))
        ));
        assert!(matches!(
            registry.resolve("oracle://db/app"),
            Err(SqlBatchError::NotFound(_))
        ));
    }
}
