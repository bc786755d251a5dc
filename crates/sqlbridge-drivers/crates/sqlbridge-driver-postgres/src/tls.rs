//! PostgreSQL TLS support
//!
//! Builds the `native-tls` connector handed to tokio-postgres. Verification
//! follows libpq: `prefer` and `require` encrypt without checking the
//! certificate unless a CA is supplied, `verify-ca` checks the chain and
//! `verify-full` also checks the hostname.

use native_tls::{Certificate, Identity, TlsConnector as NativeTlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use sqlbridge_core::{BridgeError, TlsConfig, TlsMode};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to read {what} from {path}: {source}")]
    ReadFailed {
        what: &'static str,
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid CA certificate: {0}")]
    InvalidCaCert(String),

    #[error("Invalid client identity (cert + key): {0}")]
    InvalidClientIdentity(String),

    #[error("TLS configuration error: {0}")]
    Configuration(String),

    #[error("TLS is disabled for this connection")]
    Disabled,
}

impl From<TlsError> for BridgeError {
    fn from(err: TlsError) -> Self {
        BridgeError::connection_with("Failed to set up TLS", err)
    }
}

/// Builds TLS connectors for tokio-postgres
#[derive(Debug, Clone)]
pub struct PostgresTlsConnector;

impl PostgresTlsConnector {
    /// Build a connector for `config`.
    ///
    /// Fails with [`TlsError::Disabled`] for `TlsMode::Disable`; callers use
    /// `NoTls` in that case.
    pub fn build(config: &TlsConfig) -> Result<MakeTlsConnector, TlsError> {
        config
            .validate()
            .map_err(|e| TlsError::Configuration(e.to_string()))?;

        if config.mode == TlsMode::Disable {
            return Err(TlsError::Disabled);
        }

        debug!(mode = config.mode.as_str(), "building PostgreSQL TLS connector");

        let mut builder = NativeTlsConnector::builder();
        configure_verification(&mut builder, config);

        if let Some(ca_cert) = &config.ca_cert {
            apply_ca_cert(&mut builder, ca_cert)?;
        }

        if let (Some(cert), Some(key)) = (&config.client_cert, &config.client_key) {
            apply_client_identity(&mut builder, cert, key)?;
        }

        let connector = builder
            .build()
            .map_err(|e| TlsError::Configuration(e.to_string()))?;

        Ok(MakeTlsConnector::new(connector))
    }
}

fn configure_verification(builder: &mut TlsConnectorBuilder, config: &TlsConfig) {
    match config.mode {
        TlsMode::Disable => {}
        TlsMode::Prefer | TlsMode::Require => {
            // libpq only verifies the chain in these modes when a root cert is given
            if config.ca_cert.is_none() {
                builder.danger_accept_invalid_certs(true);
            }
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyFull => {}
    }
}

fn read_file(what: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::ReadFailed {
        what,
        path: path.display().to_string(),
        source,
    })
}

fn apply_ca_cert(builder: &mut TlsConnectorBuilder, path: &Path) -> Result<(), TlsError> {
    debug!(path = %path.display(), "loading CA certificate");
    let pem = read_file("CA certificate", path)?;
    let cert = Certificate::from_pem(&pem).map_err(|e| TlsError::InvalidCaCert(e.to_string()))?;
    builder.add_root_certificate(cert);
    Ok(())
}

fn apply_client_identity(
    builder: &mut TlsConnectorBuilder,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), TlsError> {
    debug!(cert_path = %cert_path.display(), "loading client certificate and key");
    let cert = read_file("client certificate", cert_path)?;
    let key = read_file("client key", key_path)?;
    let identity = Identity::from_pkcs8(&cert, &key)
        .map_err(|e| TlsError::InvalidClientIdentity(e.to_string()))?;
    builder.identity(identity);
    Ok(())
}
