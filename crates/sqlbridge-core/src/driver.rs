//! Database driver trait: the connection factory for one dialect

use crate::{BackendId, Connection, ConnectionDescriptor, Dialect, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Builds connections for one SQL dialect
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Human-readable name (e.g. "PostgreSQL")
    fn name(&self) -> &'static str {
        self.dialect().display_name()
    }

    /// Open a pooled connection for one operation
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Connection>>;

    /// Connect, run a trivial query, disconnect
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> Result<()> {
        let connection = self.connect(descriptor).await?;
        let probe = connection.query("SELECT 1", &[]).await.map(|_| ());
        let closed = connection.close().await;
        probe.and(closed)
    }

    /// Stop the query running in session `id` from a short-lived side
    /// connection. The side connection is closed on every path.
    async fn cancel_backend(
        &self,
        descriptor: &ConnectionDescriptor,
        id: BackendId,
    ) -> Result<()> {
        let connection = self.connect(descriptor).await?;
        let statement = self.dialect().cancel_statement(id);
        tracing::debug!(dialect = %self.dialect(), backend_id = %id, "issuing out-of-band cancel");
        let outcome = connection.query(&statement, &[]).await.map(|_| ());
        let closed = connection.close().await;
        outcome.and(closed)
    }

    /// Connection URL with the credential masked, for logs and the UI
    fn build_connection_string(&self, descriptor: &ConnectionDescriptor) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.dialect().id(),
            descriptor.user,
            descriptor.host,
            descriptor.effective_port(),
            descriptor.database
        )
    }
}
