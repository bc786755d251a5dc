//! Newline-delimited JSON protocol over a byte stream (stdin/stdout in the
//! `sqlbridge` binary)
//!
//! Requests are `{"id", "method", "params"}`, one per line. Every request
//! gets exactly one response, `{"id", "result"}` or
//! `{"id", "error": {"kind", "message"}}`; responses may arrive out of
//! order. Stream notifications are written as `{"event": ...}` lines.
//!
//! Requests run concurrently, so a long `listTables` does not hold up a
//! `cancelQuery`.

use crate::engine::DataEngine;
use crate::events::{ChannelEventSink, EngineEvent, EventSink};
use crate::params::{AlterTableParams, BaselineParams, CreateTableParams, DropTableParams};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlbridge_core::{BridgeError, ConnectionDescriptor, ErrorKind, Result};
use sqlbridge_migrate::Migration;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const OUTBOUND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

impl From<&BridgeError> for ErrorBody {
    fn from(err: &BridgeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Outbound {
    Result { id: Value, result: Value },
    Error { id: Value, error: ErrorBody },
    Event { event: EngineEvent },
}

#[derive(Debug, Deserialize)]
struct DescriptorParams {
    descriptor: ConnectionDescriptor,
}

#[derive(Debug, Deserialize)]
struct SchemaParams {
    descriptor: ConnectionDescriptor,
    #[serde(default)]
    schema: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableParams {
    descriptor: ConnectionDescriptor,
    #[serde(default)]
    schema: Option<String>,
    table: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamQueryParams {
    descriptor: ConnectionDescriptor,
    sql: String,
    #[serde(default)]
    batch_size: Option<usize>,
    /// Generated when absent
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionParams {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct BaselineFromParams {
    descriptor: ConnectionDescriptor,
    #[serde(default)]
    schemas: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WriteMigrationParams {
    #[serde(default)]
    dir: Option<PathBuf>,
    migration: Migration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirParams {
    dir: Option<PathBuf>,
}

/// Serve requests from `input` until it reaches end of file.
///
/// On shutdown every running stream is cancelled and every pending
/// response and event is flushed before this returns.
pub async fn serve<R, W>(engine: Arc<DataEngine>, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(write_messages(output, out_rx));

    let (events, mut event_rx) = ChannelEventSink::channel(EVENT_CAPACITY);
    let events: Arc<dyn EventSink> = Arc::new(events);
    let forwarder = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if out_tx.send(Outbound::Event { event }).await.is_err() {
                    break;
                }
            }
        })
    };

    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let engine = Arc::clone(&engine);
                let events = Arc::clone(&events);
                let out_tx = out_tx.clone();
                requests.spawn(async move {
                    let id = request.id.clone();
                    let method = request.method.clone();
                    let message = match dispatch(&engine, &events, request).await {
                        Ok(result) => Outbound::Result { id, result },
                        Err(e) => {
                            tracing::debug!(method = %method, kind = ?e.kind(), error = %e, "Request failed");
                            Outbound::Error {
                                id,
                                error: ErrorBody::from(&e),
                            }
                        }
                    };
                    if out_tx.send(message).await.is_err() {
                        tracing::debug!("Output closed before the response was written");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request line");
                let error = ErrorBody::from(&BridgeError::Serialization(e));
                if out_tx
                    .send(Outbound::Error {
                        id: Value::Null,
                        error,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }

        while let Some(joined) = requests.try_join_next() {
            log_join(joined);
        }
    }

    tracing::info!("Input closed, shutting down");
    while let Some(joined) = requests.join_next().await {
        log_join(joined);
    }
    let cancelled = engine.cancel_all().await;
    if cancelled > 0 {
        tracing::info!(cancelled, "Cancelled running streams");
    }

    // Streams still hold the event sink until they settle
    drop(events);
    if let Err(e) = forwarder.await {
        tracing::warn!(error = %e, "Event forwarder ended abnormally");
    }
    drop(out_tx);
    match writer.await {
        Ok(written) => written,
        Err(e) => Err(BridgeError::Io(std::io::Error::other(e))),
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Request task ended abnormally");
    }
}

async fn write_messages<W>(mut output: W, mut rx: mpsc::Receiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    output.shutdown().await?;
    Ok(())
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T> {
    Ok(serde_json::from_value(params)?)
}

fn to_result<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

async fn dispatch(
    engine: &DataEngine,
    events: &Arc<dyn EventSink>,
    request: Request,
) -> Result<Value> {
    let params = request.params;
    match request.method.as_str() {
        "testConnection" => {
            let p: DescriptorParams = parse(params)?;
            to_result(engine.test_connection(&p.descriptor).await)
        }
        "streamQuery" => {
            let p: StreamQueryParams = parse(params)?;
            let session_id = p
                .session_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            // Detached; the outcome reaches the caller as events
            let _completion = engine.stream_to_events(
                &session_id,
                p.descriptor,
                &p.sql,
                p.batch_size,
                Arc::clone(events),
            )?;
            Ok(json!({ "sessionId": session_id }))
        }
        "cancelQuery" => {
            let p: SessionParams = parse(params)?;
            let cancelled = engine.cancel_query(&p.session_id).await;
            Ok(json!({ "cancelled": cancelled }))
        }
        "listSchemas" => {
            let p: DescriptorParams = parse(params)?;
            to_result(engine.list_schemas(&p.descriptor).await?)
        }
        "listTables" => {
            let p: SchemaParams = parse(params)?;
            to_result(engine.list_tables(&p.descriptor, p.schema.as_deref()).await?)
        }
        "getTableDetails" => {
            let p: TableParams = parse(params)?;
            to_result(
                engine
                    .get_table_details(&p.descriptor, p.schema.as_deref(), &p.table)
                    .await?,
            )
        }
        "getTableMetadata" => {
            let p: TableParams = parse(params)?;
            to_result(
                engine
                    .get_table_metadata(&p.descriptor, p.schema.as_deref(), &p.table)
                    .await?,
            )
        }
        "listEnumTypes" => {
            let p: SchemaParams = parse(params)?;
            to_result(engine.list_enum_types(&p.descriptor, p.schema.as_deref()).await?)
        }
        "getDBStats" => {
            let p: DescriptorParams = parse(params)?;
            to_result(engine.get_db_stats(&p.descriptor).await?)
        }
        "invalidateTableCache" => {
            let p: DescriptorParams = parse(params)?;
            Ok(json!({ "invalidated": engine.invalidate_table_cache(&p.descriptor) }))
        }
        "generateCreateTableMigration" => {
            let p: CreateTableParams = parse(params)?;
            to_result(engine.generate_create_table_migration(&p)?)
        }
        "generateAlterTableMigration" => {
            let p: AlterTableParams = parse(params)?;
            to_result(engine.generate_alter_table_migration(&p)?)
        }
        "generateDropTableMigration" => {
            let p: DropTableParams = parse(params)?;
            to_result(engine.generate_drop_table_migration(&p)?)
        }
        "generateBaselineMigration" => {
            let p: BaselineParams = parse(params)?;
            to_result(engine.generate_baseline_migration(&p.schemas, p.dialect))
        }
        "generateBaselineMigrationFrom" => {
            let p: BaselineFromParams = parse(params)?;
            to_result(
                engine
                    .generate_baseline_migration_from(&p.descriptor, &p.schemas)
                    .await?,
            )
        }
        "writeMigrationFile" => {
            let p: WriteMigrationParams = parse(params)?;
            let path = engine.write_migration_file(p.dir.as_deref(), &p.migration)?;
            Ok(json!({ "path": path }))
        }
        "listMigrations" => {
            let p: DirParams = if params.is_null() {
                DirParams::default()
            } else {
                parse(params)?
            };
            to_result(engine.list_migrations(p.dir.as_deref())?)
        }
        other => Err(BridgeError::NotSupported(format!("unknown method '{}'", other))),
    }
}

#[cfg(test)]
mod tests;
