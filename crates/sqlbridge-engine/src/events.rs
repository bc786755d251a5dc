//! Notifications for the UI, keyed by the caller's session id

use crate::executor::BatchSink;
use async_trait::async_trait;
use serde::Serialize;
use sqlbridge_core::{BridgeError, ColumnMeta, ErrorKind, Result, Row};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    /// One batch of rows; values are in column order
    Batch {
        session_id: String,
        columns: Vec<ColumnMeta>,
        rows: Vec<serde_json::Value>,
    },
    Progress {
        session_id: String,
        rows_received: u64,
    },
    Done {
        session_id: String,
        total_rows: u64,
    },
    Error {
        session_id: String,
        kind: ErrorKind,
        message: String,
    },
}

impl EngineEvent {
    pub fn session_id(&self) -> &str {
        match self {
            EngineEvent::Batch { session_id, .. }
            | EngineEvent::Progress { session_id, .. }
            | EngineEvent::Done { session_id, .. }
            | EngineEvent::Error { session_id, .. } => session_id,
        }
    }

    pub fn error(session_id: impl Into<String>, err: &BridgeError) -> Self {
        EngineEvent::Error {
            session_id: session_id.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: EngineEvent) -> Result<()>;
}

/// Forwards events into a bounded channel; a full channel makes `emit`
/// wait, which in turn holds the stream back.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: EngineEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| {
            BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "event channel closed",
            ))
        })
    }
}

/// Adapts an [`EventSink`] to the executor: each batch becomes a `batch`
/// event followed by a `progress` event, and the end of the stream a
/// `done` event.
pub struct EventBatchSink {
    session_id: String,
    events: Arc<dyn EventSink>,
    rows_received: AtomicU64,
}

impl EventBatchSink {
    pub fn new(session_id: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self {
            session_id: session_id.into(),
            events,
            rows_received: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl BatchSink for EventBatchSink {
    async fn on_batch(&self, rows: Vec<Row>, columns: &[ColumnMeta]) -> Result<()> {
        let count = rows.len() as u64;
        self.events
            .emit(EngineEvent::Batch {
                session_id: self.session_id.clone(),
                columns: columns.to_vec(),
                rows: rows.iter().map(Row::to_json).collect(),
            })
            .await?;
        let rows_received = self.rows_received.fetch_add(count, Ordering::AcqRel) + count;
        self.events
            .emit(EngineEvent::Progress {
                session_id: self.session_id.clone(),
                rows_received,
            })
            .await
    }

    async fn on_done(&self, total_rows: u64) -> Result<()> {
        self.events
            .emit(EngineEvent::Done {
                session_id: self.session_id.clone(),
                total_rows,
            })
            .await
    }
}
