//! Cancellation of a running stream
//!
//! A cancel does two things at once. It asks the server to stop the query
//! from a separate short-lived connection, which may fail or hang, and it
//! fires the session's token, which tears the stream down locally whatever
//! the server does.

use crate::session::StreamSession;
use sqlbridge_core::{ConnectionDescriptor, DatabaseDriver};
use std::sync::Arc;
use std::time::Duration;

/// Cloneable handle that cancels one stream
#[derive(Clone)]
pub struct CancelHandle {
    driver: Arc<dyn DatabaseDriver>,
    descriptor: Arc<ConnectionDescriptor>,
    session: Arc<StreamSession>,
    cancel_timeout: Duration,
}

impl CancelHandle {
    pub(crate) fn new(
        driver: Arc<dyn DatabaseDriver>,
        descriptor: Arc<ConnectionDescriptor>,
        session: Arc<StreamSession>,
        cancel_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            descriptor,
            session,
            cancel_timeout,
        }
    }

    pub fn session(&self) -> &Arc<StreamSession> {
        &self.session
    }

    /// Cancel the stream. A no-op once it has finished or been cancelled.
    ///
    /// The server-side kill runs on its own task while the local stream is
    /// torn down, so the stream settles without waiting on the server. This
    /// call returns once the kill has answered or `cancel_timeout` passed.
    ///
    /// Returns whether this call did the cancelling.
    pub async fn cancel(&self) -> bool {
        if !self.session.mark_cancelled() {
            tracing::debug!(session_id = %self.session.id(), state = ?self.session.state(), "Cancel ignored, stream already settled");
            return false;
        }

        let kill = tokio::spawn(self.clone().kill_backend());
        self.session.cancel_token().cancel();
        if let Err(e) = kill.await {
            tracing::warn!(session_id = %self.session.id(), error = %e, "Server-side cancel task ended abnormally");
        }
        true
    }

    async fn kill_backend(self) {
        let Some(backend_id) = self.session.server_execution_id() else {
            tracing::debug!(
                session_id = %self.session.id(),
                "No backend id captured yet, skipping server-side cancel"
            );
            return;
        };

        let kill = self.driver.cancel_backend(&self.descriptor, backend_id);
        match tokio::time::timeout(self.cancel_timeout, kill).await {
            Ok(Ok(())) => tracing::info!(
                session_id = %self.session.id(),
                backend_id = %backend_id,
                "Server-side cancel issued"
            ),
            Ok(Err(e)) => tracing::warn!(
                session_id = %self.session.id(),
                backend_id = %backend_id,
                error = %e,
                "Server-side cancel failed"
            ),
            Err(_) => tracing::warn!(
                session_id = %self.session.id(),
                backend_id = %backend_id,
                timeout_ms = self.cancel_timeout.as_millis() as u64,
                "Server-side cancel timed out"
            ),
        }
    }
}
