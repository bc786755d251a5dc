//! MySQL TLS support
//!
//! Translates a [`TlsConfig`] into the `SslOpts` mysql_async expects.

use mysql_async::SslOpts;
use sqlbridge_core::{BridgeError, TlsConfig, TlsMode};
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum MysqlTlsError {
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    Configuration(String),

    #[error("Client certificates are not supported for MySQL connections")]
    ClientCertUnsupported,
}

impl From<MysqlTlsError> for BridgeError {
    fn from(err: MysqlTlsError) -> Self {
        BridgeError::connection_with("Failed to set up TLS", err)
    }
}

/// Builds SSL options for mysql_async
#[derive(Debug, Clone)]
pub struct MysqlTlsConnector;

impl MysqlTlsConnector {
    /// `None` when TLS is disabled.
    pub fn build(config: &TlsConfig) -> Result<Option<SslOpts>, MysqlTlsError> {
        config
            .validate()
            .map_err(|e| MysqlTlsError::Configuration(e.to_string()))?;

        if config.mode == TlsMode::Disable {
            debug!("TLS disabled, no SSL options");
            return Ok(None);
        }
        if config.client_cert.is_some() {
            return Err(MysqlTlsError::ClientCertUnsupported);
        }

        debug!(mode = %config.mode.as_str(), "building MySQL SSL options");
        let mut ssl_opts = configure_verification(SslOpts::default(), config);
        if let Some(ca_cert) = &config.ca_cert {
            ssl_opts = apply_ca_cert(ssl_opts, ca_cert)?;
        }
        Ok(Some(ssl_opts))
    }
}

fn configure_verification(ssl_opts: SslOpts, config: &TlsConfig) -> SslOpts {
    match config.mode {
        TlsMode::Disable | TlsMode::Prefer | TlsMode::Require => {
            if config.ca_cert.is_some() {
                ssl_opts.with_danger_skip_domain_validation(true)
            } else {
                ssl_opts
                    .with_danger_accept_invalid_certs(true)
                    .with_danger_skip_domain_validation(true)
            }
        }
        TlsMode::VerifyCa => ssl_opts.with_danger_skip_domain_validation(true),
        TlsMode::VerifyFull => ssl_opts,
    }
}

fn apply_ca_cert(ssl_opts: SslOpts, path: &Path) -> Result<SslOpts, MysqlTlsError> {
    if !path.exists() {
        return Err(MysqlTlsError::CaCertLoadFailed {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }
    debug!(path = %path.display(), "adding CA certificate to SSL options");
    Ok(ssl_opts
        .with_root_certs(vec![path.to_path_buf().into()])
        .with_disable_built_in_roots(true))
}

/// The `ssl-mode` spelling MySQL clients use for a [`TlsMode`]
pub fn tls_mode_to_ssl_mode(mode: TlsMode) -> &'static str {
    match mode {
        TlsMode::Disable => "DISABLED",
        TlsMode::Prefer => "PREFERRED",
        TlsMode::Require => "REQUIRED",
        TlsMode::VerifyCa => "VERIFY_CA",
        TlsMode::VerifyFull => "VERIFY_IDENTITY",
    }
}
