//! Connection factory: descriptor to tokio-postgres configuration

use postgres_native_tls::MakeTlsConnector;
use sqlbridge_core::{ConnectionDescriptor, PoolSettings, Result, TlsConfig, TlsMode};
use tokio_postgres::config::SslMode;

use crate::PostgresTlsConnector;

const DEFAULT_APPLICATION_NAME: &str = "sqlbridge";

/// Map a descriptor TLS mode onto the tokio-postgres `sslmode`.
///
/// tokio-postgres has no verify modes of its own; certificate checks are
/// configured on the TLS connector instead.
pub fn tls_mode_to_ssl_mode(mode: TlsMode) -> SslMode {
    match mode {
        TlsMode::Disable => SslMode::Disable,
        TlsMode::Prefer => SslMode::Prefer,
        TlsMode::Require | TlsMode::VerifyCa | TlsMode::VerifyFull => SslMode::Require,
    }
}

/// Everything needed to open one PostgreSQL session
#[derive(Debug, Clone)]
pub struct PostgresConnectOptions {
    config: tokio_postgres::Config,
    tls: TlsConfig,
    settings: PoolSettings,
}

impl PostgresConnectOptions {
    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let settings = PoolSettings::from_descriptor(descriptor);

        let mut config = tokio_postgres::Config::new();
        config
            .host(&descriptor.host)
            .port(descriptor.effective_port())
            .dbname(&descriptor.database)
            .application_name(
                descriptor
                    .param("application_name")
                    .unwrap_or(DEFAULT_APPLICATION_NAME),
            )
            .connect_timeout(settings.connect_timeout())
            .ssl_mode(tls_mode_to_ssl_mode(descriptor.tls.mode));

        if !descriptor.user.is_empty() {
            config.user(&descriptor.user);
        }
        if let Some(password) = &descriptor.password {
            config.password(password);
        }
        if let Some(interval) = settings.keepalive_interval() {
            config.keepalives(true).keepalives_idle(interval);
        }
        if let Some(options) = descriptor.param("options") {
            config.options(options);
        }

        Ok(Self {
            config,
            tls: descriptor.tls.clone(),
            settings,
        })
    }

    pub fn config(&self) -> &tokio_postgres::Config {
        &self.config
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// TLS connector, or `None` when TLS is disabled
    pub fn tls_connector(&self) -> Result<Option<MakeTlsConnector>> {
        if self.tls.mode == TlsMode::Disable {
            return Ok(None);
        }
        Ok(Some(PostgresTlsConnector::build(&self.tls)?))
    }
}
