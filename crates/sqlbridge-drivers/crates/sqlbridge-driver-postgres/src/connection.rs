//! PostgreSQL connection implementation

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use sqlbridge_core::{
    BackendId, BridgeError, ColumnMeta, Connection, Dialect, QueryResult, Result, Row, RowStream,
    SchemaIntrospection, Value,
};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

use crate::PostgresConnectOptions;
use crate::value::{PgParam, columns_of, row_values};

/// Render a server error with its SQLSTATE, detail and hint
pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    for (label, extra) in [("detail", db_error.detail()), ("hint", db_error.hint())] {
        if let Some(text) = extra.filter(|t| !t.trim().is_empty()) {
            message.push_str(&format!(" ({}: {})", label, text));
        }
    }

    match db_error.code().code() {
        "57014" => format!("canceling statement due to user request: {}", message),
        "42P01" => format!("undefined table: {}", message),
        "42501" => format!("insufficient privilege: {}", message),
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        code => format!("{} (SQLSTATE {})", message, code),
    }
}

fn query_error(operation: &str, error: tokio_postgres::Error) -> BridgeError {
    BridgeError::query_with(
        format!("{}: {}", operation, format_postgres_error(&error)),
        error,
    )
}

fn spawn_connection_task<F>(connection: F) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e, "PostgreSQL connection task ended with error");
        }
    })
}

/// One PostgreSQL session.
///
/// The background task driving the socket runs on the caller's tokio
/// runtime and is aborted on `close`.
pub struct PostgresConnection {
    client: RwLock<Option<Arc<Client>>>,
    connection_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PostgresConnection {
    #[tracing::instrument(skip(options), fields(host = ?options.config().get_hosts(), database = ?options.config().get_dbname()))]
    pub async fn connect(options: &PostgresConnectOptions) -> Result<Self> {
        let config = options.config().clone();
        let deadline = options.settings().connect_timeout();

        let establish = async {
            match options.tls_connector()? {
                Some(tls) => {
                    let (client, connection) = config.connect(tls).await.map_err(|e| {
                        BridgeError::connection_with(
                            format!("Failed to connect to PostgreSQL: {}", format_postgres_error(&e)),
                            e,
                        )
                    })?;
                    Ok::<_, BridgeError>((client, spawn_connection_task(connection)))
                }
                None => {
                    let (client, connection) = config.connect(NoTls).await.map_err(|e| {
                        BridgeError::connection_with(
                            format!("Failed to connect to PostgreSQL: {}", format_postgres_error(&e)),
                            e,
                        )
                    })?;
                    Ok((client, spawn_connection_task(connection)))
                }
            }
        };

        let (client, task) = tokio::time::timeout(deadline, establish)
            .await
            .map_err(|_| {
                BridgeError::connection(format!(
                    "Timed out connecting to PostgreSQL after {}s",
                    deadline.as_secs()
                ))
            })??;

        tracing::debug!("PostgreSQL connection established");
        Ok(Self {
            client: RwLock::new(Some(Arc::new(client))),
            connection_task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    fn client(&self) -> Result<Arc<Client>> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| BridgeError::connection("PostgreSQL connection is closed"))
    }
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        if let Some(task) = self.connection_task.get_mut().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let client = self.client()?;
        client
            .execute(sql, &[])
            .await
            .map_err(|e| query_error("Failed to execute statement", e))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query");
        let client = self.client()?;
        let start = Instant::now();

        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| query_error("Failed to prepare query", e))?;

        let bound: Vec<PgParam<'_>> = params.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let pg_rows = client
            .query(&statement, &refs)
            .await
            .map_err(|e| query_error("Failed to execute query", e))?;

        let columns: Arc<[ColumnMeta]> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, c)| ColumnMeta::new(c.name(), c.type_().name(), ordinal))
            .collect();
        let rows = pg_rows
            .iter()
            .map(|row| Row::new(Arc::clone(&columns), row_values(row)))
            .collect();

        Ok(QueryResult {
            columns: columns.to_vec(),
            rows,
            affected_rows: 0,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn backend_id(&self) -> Result<BackendId> {
        let client = self.client()?;
        let row = client
            .query_one(Dialect::Postgres.backend_id_query(), &[])
            .await
            .map_err(|e| query_error("Failed to read backend pid", e))?;
        let pid: i32 = row
            .try_get(0)
            .map_err(|e| query_error("Failed to read backend pid", e))?;
        Ok(BackendId(i64::from(pid)))
    }

    /// tokio-postgres stops reading the socket once its response buffer is
    /// full, so an unpolled stream holds the server back without any extra
    /// buffering here.
    async fn stream(&self, sql: &str, _capacity: usize) -> Result<RowStream> {
        let client = self.client()?;
        let rows = client
            .query_raw(sql, std::iter::empty::<&(dyn ToSql + Sync)>())
            .await
            .map_err(|e| query_error("Failed to start query", e))?;

        let mut columns: Option<Arc<[ColumnMeta]>> = None;
        let stream = rows.map(move |item| {
            let row = item.map_err(|e| query_error("Failed to read row", e))?;
            let shared = columns.get_or_insert_with(|| columns_of(&row));
            Ok::<_, BridgeError>(Row::new(Arc::clone(shared), row_values(&row)))
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.write().take();
        if let Some(task) = self.connection_task.lock().take() {
            task.abort();
        }
        tracing::debug!("PostgreSQL connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}
