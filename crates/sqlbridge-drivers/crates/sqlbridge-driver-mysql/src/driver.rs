//! MySQL driver implementation

use async_trait::async_trait;
use sqlbridge_core::{Connection, ConnectionDescriptor, DatabaseDriver, Dialect, Result};
use std::sync::Arc;

use crate::{MySqlConnectOptions, MySqlConnection};

/// MySQL/MariaDB database driver
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        tracing::debug!("MySQL driver initialized");
        Self
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    #[tracing::instrument(skip(self, descriptor), fields(host = %descriptor.host, database = %descriptor.database))]
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        let options = MySqlConnectOptions::from_descriptor(descriptor)?;
        let connection = MySqlConnection::connect(&options).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to connect to MySQL database");
        })?;

        tracing::info!(
            host = %descriptor.host,
            port = descriptor.effective_port(),
            database = %descriptor.database,
            tls = %descriptor.tls.mode.as_str(),
            "MySQL connection created"
        );
        Ok(Arc::new(connection))
    }
}
