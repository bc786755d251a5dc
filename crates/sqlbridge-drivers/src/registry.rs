//! Driver registry keyed by dialect

use sqlbridge_core::{BridgeError, DatabaseDriver, Dialect, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
pub struct DriverRegistry {
    drivers: HashMap<Dialect, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// A registry with every driver compiled in
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));
        #[cfg(feature = "mysql")]
        registry.register(Arc::new(crate::mysql::MySqlDriver::new()));

        registry
    }

    /// Register a driver, replacing any previous driver for its dialect
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let dialect = driver.dialect();
        tracing::info!(driver = %driver.name(), "registering database driver");
        self.drivers.insert(dialect, driver);
    }

    pub fn get(&self, dialect: Dialect) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&dialect).cloned();
        if driver.is_none() {
            tracing::warn!(dialect = %dialect, "driver not found in registry");
        }
        driver
    }

    /// Like [`get`](Self::get) but reports a missing driver as an error
    pub fn require(&self, dialect: Dialect) -> Result<Arc<dyn DatabaseDriver>> {
        self.get(dialect).ok_or_else(|| {
            BridgeError::NotSupported(format!(
                "No driver registered for {}",
                dialect.display_name()
            ))
        })
    }

    /// Registered dialects in a stable order
    pub fn list(&self) -> Vec<Dialect> {
        Dialect::ALL
            .iter()
            .copied()
            .filter(|d| self.drivers.contains_key(d))
            .collect()
    }

    pub fn has(&self, dialect: Dialect) -> bool {
        self.drivers.contains_key(&dialect)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
