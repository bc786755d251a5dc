//! Streaming query executor
//!
//! Runs one query as a server-side cursor and hands rows to a [`BatchSink`]
//! in fixed-size batches. The next row is not pulled until the sink has
//! accepted the previous batch, so a slow consumer slows the cursor down.

use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::logging::sql_preview;
use crate::session::StreamSession;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use sqlbridge_core::{
    BridgeError, ColumnMeta, Connection, ConnectionDescriptor, DatabaseDriver, ErrorKind, Result,
    Row,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Consumer of streamed rows.
///
/// `on_batch` may suspend; the stream waits for it before reading on.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn on_batch(&self, rows: Vec<Row>, columns: &[ColumnMeta]) -> Result<()>;

    /// Called once after the last batch of a stream that ran to the end
    async fn on_done(&self, _total_rows: u64) -> Result<()> {
        Ok(())
    }
}

/// Knobs for one executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub batch_size: usize,
    pub stream_timeout: Duration,
    pub cancel_timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ExecutorOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.default_batch_size,
            stream_timeout: config.stream_timeout(),
            cancel_timeout: config.cancel_timeout(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }
}

/// Outcome of a stream that ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub session_id: String,
    pub total_rows: u64,
    pub batches: u64,
    pub elapsed_ms: u64,
}

pub struct StreamingExecutor {
    driver: Arc<dyn DatabaseDriver>,
    options: ExecutorOptions,
}

impl StreamingExecutor {
    pub fn new(driver: Arc<dyn DatabaseDriver>, options: ExecutorOptions) -> Self {
        Self { driver, options }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Start streaming `sql` on a task of its own.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        session_id: impl Into<String>,
        descriptor: ConnectionDescriptor,
        sql: impl Into<String>,
        sink: Arc<dyn BatchSink>,
    ) -> Result<StreamHandle> {
        if self.options.batch_size == 0 {
            return Err(BridgeError::Configuration(
                "batch size must be a positive integer".to_string(),
            ));
        }
        descriptor.validate()?;

        let session = Arc::new(StreamSession::new(session_id, self.options.batch_size));
        let descriptor = Arc::new(descriptor);
        let canceller = CancelHandle::new(
            Arc::clone(&self.driver),
            Arc::clone(&descriptor),
            Arc::clone(&session),
            self.options.cancel_timeout,
        );

        let run = StreamRun {
            driver: Arc::clone(&self.driver),
            descriptor,
            sql: sql.into(),
            stream_timeout: self.options.stream_timeout,
            release_timeout: self.options.cancel_timeout,
            session: Arc::clone(&session),
            sink,
        };
        let task = tokio::spawn(run.execute());

        Ok(StreamHandle {
            session,
            canceller,
            task,
        })
    }
}

/// A running stream: await [`completion`](Self::completion), cancel through
/// [`cancel`](Self::cancel) or a [`CancelHandle`] from another task.
pub struct StreamHandle {
    session: Arc<StreamSession>,
    canceller: CancelHandle,
    task: JoinHandle<Result<StreamSummary>>,
}

impl StreamHandle {
    pub fn session(&self) -> &Arc<StreamSession> {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn rows_received(&self) -> u64 {
        self.session.rows_received()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.canceller.clone()
    }

    pub async fn cancel(&self) -> bool {
        self.canceller.cancel().await
    }

    /// Resolves when the stream settles. A completed stream has released its
    /// connection by then; a failed or cancelled one has released it or
    /// left the close running in the background.
    pub async fn completion(self) -> Result<StreamSummary> {
        match self.task.await {
            Ok(result) => result,
            Err(join_error) => {
                self.session.mark_finished();
                self.session.mark_settled();
                Err(BridgeError::query(format!(
                    "stream task ended abnormally: {}",
                    join_error
                )))
            }
        }
    }
}

struct StreamRun {
    driver: Arc<dyn DatabaseDriver>,
    descriptor: Arc<ConnectionDescriptor>,
    sql: String,
    stream_timeout: Duration,
    /// How long a failed or cancelled stream waits for its connection to close
    release_timeout: Duration,
    session: Arc<StreamSession>,
    sink: Arc<dyn BatchSink>,
}

impl StreamRun {
    #[tracing::instrument(
        name = "stream_query",
        skip(self),
        fields(
            session_id = %self.session.id(),
            dialect = %self.descriptor.dialect,
            sql_preview = %sql_preview(&self.sql, 100),
        )
    )]
    async fn execute(self) -> Result<StreamSummary> {
        let started = Instant::now();
        let outcome = self.connect_and_drive().await;

        // A successful drive has already moved the session to Finished
        let result = match outcome {
            Ok(batches) => Ok(StreamSummary {
                session_id: self.session.id().to_string(),
                total_rows: self.session.rows_received(),
                batches,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            Err(_) if self.session.is_cancelled() => Err(BridgeError::Cancelled),
            Err(e) => {
                self.session.mark_finished();
                Err(e)
            }
        };

        match &result {
            Ok(summary) => tracing::info!(
                rows = summary.total_rows,
                batches = summary.batches,
                elapsed_ms = summary.elapsed_ms,
                "Stream completed"
            ),
            Err(BridgeError::Cancelled) => tracing::info!(
                rows = self.session.rows_received(),
                "Stream cancelled"
            ),
            Err(e) => tracing::error!(
                rows = self.session.rows_received(),
                kind = ?e.kind(),
                error = %e,
                "Stream failed"
            ),
        }

        self.session.mark_settled();
        result
    }

    async fn connect_and_drive(&self) -> Result<u64> {
        let token = self.session.cancel_token();
        let connection = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(BridgeError::Cancelled),
            connection = self.driver.connect(&self.descriptor) => {
                connection.map_err(|e| e.context("Failed to open connection"))?
            }
        };
        let guard = ConnectionGuard::new(connection);

        let driven = match tokio::time::timeout(self.stream_timeout, self.drive(guard.connection())).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(format!(
                "query exceeded the {}ms stream timeout",
                self.stream_timeout.as_millis()
            ))),
        };

        // Released exactly once whichever way the stream ended. A connection
        // torn down mid-result may take as long as the server to close, so
        // failed streams only wait for it up to the release timeout.
        let released = if driven.is_ok() {
            guard.release().await
        } else {
            guard.release_within(self.release_timeout).await
        };
        if let Err(e) = released {
            tracing::warn!(error = %e, "Failed to close streaming connection");
        }
        driven
    }

    async fn drive(&self, connection: &dyn Connection) -> Result<u64> {
        let token = self.session.cancel_token();
        let batch_size = self.session.batch_size();

        let backend_id = connection
            .backend_id()
            .await
            .map_err(|e| into_query_error(e.context("Failed to read backend id")))?;
        self.session.set_server_execution_id(backend_id);
        tracing::debug!(backend_id = %backend_id, "Captured server execution id");

        let mut rows = connection
            .stream(&self.sql, batch_size)
            .await
            .map_err(|e| into_query_error(e.context("Failed to start query")))?;

        let mut buffer: Vec<Row> = Vec::with_capacity(batch_size);
        let mut columns: Option<Arc<[ColumnMeta]>> = None;
        let mut batches = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(BridgeError::Cancelled),
                next = rows.next() => next,
            };
            match next {
                Some(Ok(row)) => {
                    if columns.is_none() {
                        columns = Some(row.shared_columns());
                    }
                    buffer.push(row);
                    if buffer.len() >= batch_size {
                        let batch = std::mem::replace(&mut buffer, Vec::with_capacity(batch_size));
                        self.deliver(batch, columns.as_deref().unwrap_or_default()).await?;
                        batches += 1;
                    }
                }
                Some(Err(e)) => return Err(into_query_error(e)),
                None => break,
            }
        }

        if !buffer.is_empty() {
            self.deliver(buffer, columns.as_deref().unwrap_or_default()).await?;
            batches += 1;
        }

        // From here a cancel is a no-op
        if !self.session.mark_finished() {
            return Err(BridgeError::Cancelled);
        }
        self.sink.on_done(self.session.rows_received()).await?;
        Ok(batches)
    }

    async fn deliver(&self, batch: Vec<Row>, columns: &[ColumnMeta]) -> Result<()> {
        let token = self.session.cancel_token();
        if self.session.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        let count = batch.len() as u64;
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(BridgeError::Cancelled),
            delivered = self.sink.on_batch(batch, columns) => delivered?,
        }
        let total = self.session.add_rows(count);
        tracing::trace!(rows = count, total, "Delivered batch");
        Ok(())
    }
}

/// Failures while a query runs surface as query errors with the cause kept
fn into_query_error(err: BridgeError) -> BridgeError {
    match err.kind() {
        ErrorKind::QueryExecution | ErrorKind::Cancelled | ErrorKind::Timeout => err,
        _ => BridgeError::query_with(err.to_string(), err),
    }
}

/// Owns the stream's connection and closes it once.
///
/// If the task is torn down before [`release`](Self::release) runs, the
/// close happens on a detached task instead.
struct ConnectionGuard {
    connection: Arc<dyn Connection>,
    released: bool,
}

impl ConnectionGuard {
    fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            released: false,
        }
    }

    fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    async fn release(mut self) -> Result<()> {
        self.released = true;
        self.connection.close().await
    }

    /// Close on a task of its own and wait at most `limit` for it; past
    /// that the close finishes in the background.
    async fn release_within(mut self, limit: Duration) -> Result<()> {
        self.released = true;
        let connection = Arc::clone(&self.connection);
        let close = tokio::spawn(async move { connection.close().await });
        match tokio::time::timeout(limit, close).await {
            Ok(Ok(closed)) => closed,
            Ok(Err(join_error)) => Err(BridgeError::connection(format!(
                "close task ended abnormally: {}",
                join_error
            ))),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "Streaming connection still closing, continuing in the background"
                );
                Ok(())
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let connection = Arc::clone(&self.connection);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = connection.close().await {
                        tracing::warn!(error = %e, "Failed to close abandoned streaming connection");
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime available to close abandoned streaming connection"),
        }
    }
}
