//! PostgreSQL driver implementation

use async_trait::async_trait;
use sqlbridge_core::{Connection, ConnectionDescriptor, DatabaseDriver, Dialect, Result};
use std::sync::Arc;

use crate::{PostgresConnectOptions, PostgresConnection};

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    #[tracing::instrument(skip(self, descriptor), fields(host = %descriptor.host, database = %descriptor.database))]
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        let options = PostgresConnectOptions::from_descriptor(descriptor)?;
        let connection = PostgresConnection::connect(&options).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
        })?;

        tracing::info!(
            host = %descriptor.host,
            port = descriptor.effective_port(),
            database = %descriptor.database,
            tls = %descriptor.tls.mode.as_str(),
            "PostgreSQL connection created"
        );
        Ok(Arc::new(connection))
    }
}

#[cfg(test)]
mod tests;
