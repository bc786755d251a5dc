//! TLS settings for database connections
//!
//! Modes follow the libpq `sslmode` names. Each driver's connection
//! factory maps them onto whatever its client library offers.

use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// TLS mode for database connections
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Plain TCP only
    Disable,
    /// Use TLS when the server offers it
    #[default]
    Prefer,
    /// Require TLS without verifying the certificate
    Require,
    /// Require TLS and verify the server certificate against the CA
    VerifyCa,
    /// Verify the CA and that the hostname matches
    VerifyFull,
}

impl TlsMode {
    pub fn requires_encryption(&self) -> bool {
        matches!(
            self,
            TlsMode::Require | TlsMode::VerifyCa | TlsMode::VerifyFull
        )
    }

    pub fn requires_ca_verification(&self) -> bool {
        matches!(self, TlsMode::VerifyCa | TlsMode::VerifyFull)
    }

    pub fn requires_hostname_verification(&self) -> bool {
        matches!(self, TlsMode::VerifyFull)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::Disable => "disable",
            TlsMode::Prefer => "prefer",
            TlsMode::Require => "require",
            TlsMode::VerifyCa => "verify-ca",
            TlsMode::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for TlsMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "disable" | "disabled" | "false" | "off" => Ok(TlsMode::Disable),
            "allow" | "prefer" | "preferred" => Ok(TlsMode::Prefer),
            "require" | "required" | "true" | "on" => Ok(TlsMode::Require),
            "verify-ca" => Ok(TlsMode::VerifyCa),
            "verify-full" | "verify-identity" => Ok(TlsMode::VerifyFull),
            other => Err(BridgeError::Configuration(format!(
                "unknown TLS mode '{}'",
                other
            ))),
        }
    }
}

/// TLS configuration for a connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub mode: TlsMode,
    /// CA certificate used to verify the server
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    /// Client certificate for mutual TLS
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    /// Client private key for mutual TLS
    #[serde(default)]
    pub client_key: Option<PathBuf>,
}

impl TlsConfig {
    pub fn new(mode: TlsMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self::new(TlsMode::Disable)
    }

    pub fn require() -> Self {
        Self::new(TlsMode::Require)
    }

    pub fn verify_full() -> Self {
        Self::new(TlsMode::VerifyFull)
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn client_cert(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.client_cert = Some(cert_path.into());
        self.client_key = Some(key_path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode.requires_ca_verification() && self.ca_cert.is_none() {
            return Err(BridgeError::Configuration(format!(
                "TLS mode '{}' requires a CA certificate",
                self.mode.as_str()
            )));
        }

        for (label, path) in [
            ("CA certificate", &self.ca_cert),
            ("Client certificate", &self.client_cert),
            ("Client key", &self.client_key),
        ] {
            if let Some(path) = path
                && path.as_os_str().is_empty()
            {
                return Err(BridgeError::Configuration(format!(
                    "{} path cannot be empty",
                    label
                )));
            }
        }

        match (&self.client_cert, &self.client_key) {
            (Some(_), None) => Err(BridgeError::Configuration(
                "Client certificate provided but client key is missing".to_string(),
            )),
            (None, Some(_)) => Err(BridgeError::Configuration(
                "Client key provided but client certificate is missing".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
