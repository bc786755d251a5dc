//! MySQL connection implementation

use async_trait::async_trait;
use futures::StreamExt;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Column, Conn, Params, Pool, Row as MySqlRow};
use sqlbridge_core::{
    BackendId, BridgeError, ColumnMeta, Connection, Dialect, QueryResult, Result, Row, RowStream,
    SchemaIntrospection, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

use crate::MySqlConnectOptions;
use crate::value::{columns_of, row_values, to_mysql};

const ER_QUERY_INTERRUPTED: u16 = 1317;

fn format_mysql_error(error: &mysql_async::Error) -> String {
    match error {
        mysql_async::Error::Server(server) if server.code == ER_QUERY_INTERRUPTED => {
            format!("query interrupted: {}", server.message)
        }
        mysql_async::Error::Server(server) => {
            format!("{} (error {}, SQLSTATE {})", server.message, server.code, server.state)
        }
        other => other.to_string(),
    }
}

fn query_error(operation: &str, error: mysql_async::Error) -> BridgeError {
    BridgeError::query_with(format!("{}: {}", operation, format_mysql_error(&error)), error)
}

fn closed_error() -> BridgeError {
    BridgeError::connection("MySQL connection is closed")
}

fn column_types(columns: Option<&Arc<[Column]>>) -> Vec<ColumnType> {
    columns
        .map(|c| c.iter().map(Column::column_type).collect())
        .unwrap_or_default()
}

/// One MySQL session.
///
/// A single pooled `Conn` is pinned for the connection's lifetime so the id
/// reported by `backend_id` is the session that runs the following query.
pub struct MySqlConnection {
    pool: Pool,
    session: Arc<Mutex<Option<Conn>>>,
    database: String,
    closed: AtomicBool,
}

impl MySqlConnection {
    #[tracing::instrument(skip(options), fields(host = %options.opts().ip_or_hostname(), database = ?options.opts().db_name()))]
    pub async fn connect(options: &MySqlConnectOptions) -> Result<Self> {
        let pool = Pool::new(options.opts().clone());
        let deadline = options.settings().connect_timeout();

        let conn = match tokio::time::timeout(deadline, pool.get_conn()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                let message = format!("Failed to connect to MySQL: {}", format_mysql_error(&e));
                let _ = pool.disconnect().await;
                return Err(BridgeError::connection_with(message, e));
            }
            Err(_) => {
                let _ = pool.disconnect().await;
                return Err(BridgeError::connection(format!(
                    "Timed out connecting to MySQL after {}s",
                    deadline.as_secs()
                )));
            }
        };

        tracing::debug!(connection_id = conn.id(), "MySQL connection established");
        Ok(Self {
            pool,
            session: Arc::new(Mutex::new(Some(conn))),
            database: options.opts().db_name().unwrap_or_default().to_string(),
            closed: AtomicBool::new(false),
        })
    }

    /// Database that catalog queries fall back to when no schema is given
    pub fn default_database(&self) -> &str {
        &self.database
    }

    async fn session(&self) -> Result<OwnedMutexGuard<Option<Conn>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        let guard = Arc::clone(&self.session).lock_owned().await;
        if guard.is_none() {
            return Err(closed_error());
        }
        Ok(guard)
    }
}

/// Pump rows from the pinned session into `tx` until the result set ends,
/// the consumer goes away, or the server reports an error.
async fn pump_rows(conn: &mut Conn, sql: &str, tx: &mpsc::Sender<Result<Row>>) -> Result<()> {
    let mut result = conn
        .query_iter(sql)
        .await
        .map_err(|e| query_error("Failed to start query", e))?;

    let columns = result.columns();
    let types = column_types(columns.as_ref());
    let meta: Arc<[ColumnMeta]> = match columns.as_deref() {
        Some(columns) => columns_of(columns),
        None => return Ok(()),
    };

    loop {
        let next = tokio::select! {
            _ = tx.closed() => return Ok(()),
            next = result.next() => next,
        };
        let Some(row) = next.map_err(|e| query_error("Failed to read row", e))? else {
            return Ok(());
        };
        let row = Row::new(Arc::clone(&meta), row_values(row, &types));
        if tx.send(Ok(row)).await.is_err() {
            return Ok(());
        }
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut guard = self.session().await?;
        let conn = guard.as_mut().ok_or_else(closed_error)?;
        conn.query_drop(sql)
            .await
            .map_err(|e| query_error("Failed to execute statement", e))?;
        Ok(conn.affected_rows())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query");
        let start = Instant::now();
        let mut guard = self.session().await?;
        let conn = guard.as_mut().ok_or_else(closed_error)?;

        let (columns, raw_rows) = if params.is_empty() {
            let mut result = conn
                .query_iter(sql)
                .await
                .map_err(|e| query_error("Failed to execute query", e))?;
            let columns = result.columns();
            let rows: Vec<MySqlRow> = result
                .collect()
                .await
                .map_err(|e| query_error("Failed to read rows", e))?;
            (columns, rows)
        } else {
            let bound = Params::Positional(params.iter().map(to_mysql).collect());
            let mut result = conn
                .exec_iter(sql, bound)
                .await
                .map_err(|e| query_error("Failed to execute query", e))?;
            let columns = result.columns();
            let rows: Vec<MySqlRow> = result
                .collect()
                .await
                .map_err(|e| query_error("Failed to read rows", e))?;
            (columns, rows)
        };

        let types = column_types(columns.as_ref());
        let meta: Arc<[ColumnMeta]> = columns
            .as_deref()
            .map(columns_of)
            .unwrap_or_else(|| Arc::from(Vec::new()));
        let rows = raw_rows
            .into_iter()
            .map(|row| Row::new(Arc::clone(&meta), row_values(row, &types)))
            .collect();

        Ok(QueryResult {
            columns: meta.to_vec(),
            rows,
            affected_rows: conn.affected_rows(),
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// The handshake connection id, which is what `CONNECTION_ID()` and
    /// `KILL QUERY` refer to.
    async fn backend_id(&self) -> Result<BackendId> {
        let guard = self.session().await?;
        let conn = guard.as_ref().ok_or_else(closed_error)?;
        Ok(BackendId(i64::from(conn.id())))
    }

    /// Rows are read by a task that owns the session and feeds a channel of
    /// `capacity` slots, so the reader stalls once the consumer falls behind.
    async fn stream(&self, sql: &str, capacity: usize) -> Result<RowStream> {
        let mut guard = self.session().await?;
        let (tx, rx) = mpsc::channel::<Result<Row>>(capacity.max(1));
        let sql = sql.to_string();

        tokio::spawn(async move {
            let Some(conn) = guard.as_mut() else {
                return;
            };
            if let Err(e) = pump_rows(conn, &sql, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    /// A `Conn` dropped with an unread result is drained before the pool
    /// finishes disconnecting, so this can take as long as the server does.
    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        drop(self.session.lock().await.take());
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| BridgeError::connection_with("Failed to close MySQL pool", e))?;
        tracing::debug!("MySQL connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}
