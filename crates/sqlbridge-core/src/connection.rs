//! Connection trait and streaming types

use crate::{ColumnMeta, Dialect, QueryResult, Result, Row, SchemaIntrospection, Value};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned id of the session running a query.
///
/// Postgres backend pid or MySQL connection id; the target of an
/// out-of-band cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendId(pub i64);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rows of a server-side cursor, in the order the server produced them
pub type RowStream = BoxStream<'static, Result<Row>>;

/// A live database connection
#[async_trait]
pub trait Connection: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows, yielding the affected count
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Run a query and collect every row. Only for small catalog queries.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Id of the server session behind this connection
    async fn backend_id(&self) -> Result<BackendId>;

    /// Start `sql` as a row-by-row cursor.
    ///
    /// The driver reads ahead at most `capacity` rows; once that many are
    /// waiting it stops pulling from the server until the consumer catches
    /// up. Dropping the stream stops the cursor.
    async fn stream(&self, sql: &str, capacity: usize) -> Result<RowStream>;

    /// Close the connection and any pool behind it. Idempotent.
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// Column list of a result set, taken from its first row
pub fn columns_of(rows: &[Row]) -> Vec<ColumnMeta> {
    rows.first()
        .map(|row| row.columns().to_vec())
        .unwrap_or_default()
}
