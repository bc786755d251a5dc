//! PostgreSQL driver for sqlbridge

mod connection;
mod driver;
mod factory;
mod schema;
mod tls;
mod value;

pub use connection::PostgresConnection;
pub use driver::PostgresDriver;
pub use factory::{PostgresConnectOptions, tls_mode_to_ssl_mode};
pub use tls::{PostgresTlsConnector, TlsError};
