//! MySQL/MariaDB driver for sqlbridge

mod connection;
mod driver;
mod factory;
mod schema;
mod tls;
mod value;

pub use connection::MySqlConnection;
pub use driver::MySqlDriver;
pub use factory::MySqlConnectOptions;
pub use tls::{MysqlTlsConnector, MysqlTlsError, tls_mode_to_ssl_mode};
