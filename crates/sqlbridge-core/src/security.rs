//! Transport security settings carried by a connection descriptor

mod tls_config;

pub use tls_config::*;
