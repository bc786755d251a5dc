//! Turns a generic descriptor into mysql_async options

use mysql_async::{Opts, OptsBuilder, PoolConstraints, PoolOpts};
use sqlbridge_core::{BridgeError, ConnectionDescriptor, PoolSettings, Result};

use crate::MysqlTlsConnector;

/// Validated mysql_async options plus the pool sizing they were built from
#[derive(Debug, Clone)]
pub struct MySqlConnectOptions {
    opts: Opts,
    settings: PoolSettings,
}

impl MySqlConnectOptions {
    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let settings = PoolSettings::from_descriptor(descriptor);

        let constraints = PoolConstraints::new(1, settings.max_size()).ok_or_else(|| {
            BridgeError::Configuration(format!(
                "Invalid MySQL pool constraints (min=1, max={})",
                settings.max_size()
            ))
        })?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_inactive_connection_ttl(settings.idle_timeout())
            .with_reset_connection(false);

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(descriptor.host.clone())
            .tcp_port(descriptor.effective_port())
            .db_name(Some(descriptor.database.clone()))
            .pool_opts(pool_opts)
            .ssl_opts(MysqlTlsConnector::build(&descriptor.tls)?);

        if !descriptor.user.is_empty() {
            builder = builder.user(Some(descriptor.user.clone()));
        }
        if let Some(password) = &descriptor.password {
            builder = builder.pass(Some(password.clone()));
        }
        if let Some(interval) = settings.keepalive_interval() {
            builder = builder.tcp_keepalive(Some(interval.as_millis() as u32));
        }
        if let Some(init) = descriptor.param("init_command") {
            builder = builder.init(vec![init.to_string()]);
        }

        Ok(Self {
            opts: builder.into(),
            settings,
        })
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}
