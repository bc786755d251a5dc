//! Pool sizing and lifecycle settings derived from a descriptor

use crate::ConnectionDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_SIZE: usize = 1;
const MAX_POOL_SIZE: usize = 16;

/// Settings every connection factory applies to the pool it builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    max_size: usize,
    /// Timeout in milliseconds for establishing a connection
    connect_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
    /// TCP keep-alive interval in milliseconds
    keepalive_interval_ms: Option<u64>,
}

impl PoolSettings {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.clamp(1, MAX_POOL_SIZE),
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 60_000,
            keepalive_interval_ms: Some(30_000),
        }
    }

    /// Settings for one operation against `descriptor`.
    ///
    /// The pool-size hint is clamped to `1..=16`; every operation opens
    /// and fully closes its own pool, so a large pool buys nothing.
    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Self {
        let mut settings = Self::new(
            descriptor
                .pool_size
                .map(|size| size as usize)
                .unwrap_or(DEFAULT_MAX_SIZE),
        );
        if let Some(secs) = descriptor.connect_timeout_secs {
            settings = settings.with_connect_timeout_ms(secs.saturating_mul(1000));
        }
        settings
    }

    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    pub fn with_keepalive_interval_ms(mut self, interval_ms: Option<u64>) -> Self {
        self.keepalive_interval_ms = interval_ms;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive_interval_ms.map(Duration::from_millis)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}
