//! sqlbridge drivers - concrete dialect drivers behind one registry
//!
//! The engine looks drivers up by [`Dialect`]; which ones exist is decided
//! by the `postgres` and `mysql` features.

#[cfg(feature = "mysql")]
pub use sqlbridge_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use sqlbridge_driver_postgres as postgres;

mod registry;

pub use registry::DriverRegistry;

pub use sqlbridge_core::{
    BridgeError, Connection, ConnectionDescriptor, DatabaseDriver, Dialect, Result,
    SchemaIntrospection,
};
