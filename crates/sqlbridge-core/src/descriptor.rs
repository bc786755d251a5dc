//! Generic connection descriptor handed in by the caller

use crate::{BridgeError, Dialect, Result, TlsConfig, TlsMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Everything needed to reach one database.
///
/// Owned by the caller and immutable for the duration of a call. The engine
/// never persists it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    pub dialect: Dialect,
    pub host: String,
    /// 0 selects the dialect's default port
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default)]
    pub tls: TlsConfig,
    /// Upper bound on pooled connections for a single operation
    #[serde(default)]
    pub pool_size: Option<u32>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Driver-specific extras (e.g. `application_name`)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConnectionDescriptor {
    pub fn new(
        dialect: Dialect,
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            host: host.into(),
            port: 0,
            user: user.into(),
            password: None,
            database: database.into(),
            tls: TlsConfig::default(),
            pool_size: None,
            connect_timeout_secs: None,
            params: HashMap::new(),
        }
    }

    pub fn postgres(host: impl Into<String>, database: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(Dialect::Postgres, host, database, user)
    }

    pub fn mysql(host: impl Into<String>, database: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(Dialect::MySql, host, database, user)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_tls_mode(mut self, mode: TlsMode) -> Self {
        self.tls.mode = mode;
        self
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = Some(size);
        self
    }

    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Port to dial, falling back to the dialect default
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.dialect.default_port()
        } else {
            self.port
        }
    }

    /// Key used by the table-list cache: `host:port:database`
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.host, self.effective_port(), self.database)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "Connection host cannot be empty".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "Target database cannot be empty".to_string(),
            ));
        }
        if self.pool_size == Some(0) {
            return Err(BridgeError::Configuration(
                "Pool size must be at least 1".to_string(),
            ));
        }
        self.tls.validate()
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.effective_port())
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("tls", &self.tls.mode)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[cfg(test)]
mod tests;
