//! Engine configuration
//!
//! Read from `engine.toml` under the platform config directory when present;
//! every field has a default so an empty or missing file is valid.

use serde::{Deserialize, Serialize};
use sqlbridge_core::{BridgeError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for streaming, cancellation and the table list cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard ceiling on one streamed query, in seconds
    pub stream_timeout_secs: u64,
    /// Bound on the out-of-band kill issued by a cancel
    pub cancel_timeout_secs: u64,
    pub table_cache_ttl_secs: u64,
    /// Rows per batch when the caller does not pick a size
    pub default_batch_size: usize,
    /// Where migration files go when the caller names no directory
    pub migrations_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_timeout_secs: 300,
            cancel_timeout_secs: 5,
            table_cache_ttl_secs: 60,
            default_batch_size: 1000,
            migrations_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BridgeError::Configuration(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| e.context(&format!("Failed to load {}", path.display())))
    }

    /// `<config dir>/sqlbridge/engine.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlbridge").join("engine.toml"))
    }

    /// Load the default config file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path().filter(|p| p.exists()) else {
            tracing::debug!("No engine config file found, using defaults");
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded engine config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid engine config");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 {
            return Err(BridgeError::Configuration(
                "default_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.stream_timeout_secs == 0 {
            return Err(BridgeError::Configuration(
                "stream_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_timeout_secs)
    }

    pub fn table_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.table_cache_ttl_secs)
    }

    pub fn with_stream_timeout_secs(mut self, secs: u64) -> Self {
        self.stream_timeout_secs = secs;
        self
    }

    pub fn with_cancel_timeout_secs(mut self, secs: u64) -> Self {
        self.cancel_timeout_secs = secs;
        self
    }

    pub fn with_table_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.table_cache_ttl_secs = secs;
        self
    }

    pub fn with_default_batch_size(mut self, size: usize) -> Self {
        self.default_batch_size = size;
        self
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests;
