//! Per-stream session state

use parking_lot::Mutex;
use serde::Serialize;
use sqlbridge_core::BackendId;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Lifecycle of one streamed query.
///
/// Starts `Active`; moves once to `Cancelled` or `Finished` and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Cancelled,
    Finished,
}

/// State shared between a running stream, its cancel handle and the
/// engine's session registry.
#[derive(Debug)]
pub struct StreamSession {
    id: String,
    batch_size: usize,
    state: Mutex<SessionState>,
    server_execution_id: Mutex<Option<BackendId>>,
    rows_received: AtomicU64,
    /// Fired by a cancel to unblock the stream wherever it is waiting
    cancel: CancellationToken,
    /// Fired once the stream task has released its connection
    settled: CancellationToken,
}

impl StreamSession {
    pub fn new(id: impl Into<String>, batch_size: usize) -> Self {
        Self {
            id: id.into(),
            batch_size,
            state: Mutex::new(SessionState::Active),
            server_execution_id: Mutex::new(None),
            rows_received: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            settled: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == SessionState::Cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.state() == SessionState::Finished
    }

    /// Returns false when the session had already left `Active`
    pub fn mark_cancelled(&self) -> bool {
        self.transition(SessionState::Cancelled)
    }

    pub fn mark_finished(&self) -> bool {
        self.transition(SessionState::Finished)
    }

    fn transition(&self, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Active {
            return false;
        }
        *state = to;
        true
    }

    /// Server session running the query, once the stream has captured it
    pub fn server_execution_id(&self) -> Option<BackendId> {
        *self.server_execution_id.lock()
    }

    pub(crate) fn set_server_execution_id(&self, id: BackendId) {
        *self.server_execution_id.lock() = Some(id);
    }

    /// Rows handed to the consumer so far
    pub fn rows_received(&self) -> u64 {
        self.rows_received.load(Ordering::Acquire)
    }

    pub(crate) fn add_rows(&self, count: u64) -> u64 {
        self.rows_received.fetch_add(count, Ordering::AcqRel) + count
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn mark_settled(&self) {
        self.settled.cancel();
    }

    pub fn is_settled(&self) -> bool {
        self.settled.is_cancelled()
    }

    /// Resolves once the stream has torn down and released its connection
    pub async fn settled(&self) {
        self.settled.cancelled().await
    }
}
