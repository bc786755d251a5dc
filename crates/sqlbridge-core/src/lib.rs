//! sqlbridge core - shared abstractions for the data-access engine
//!
//! This crate provides the types and traits every other sqlbridge crate
//! depends on:
//!
//! - `DatabaseDriver` - connection factory for one SQL dialect
//! - `Connection` - a live connection able to run, stream and identify queries
//! - `SchemaIntrospection` - catalog queries feeding the DDL synthesizer
//! - `Dialect` - identifier quoting and the statement shapes that differ per engine
//! - `ConnectionDescriptor` and `PoolSettings` - what a caller hands in to connect
//! - Common types like `Value`, `Row`, `ColumnMeta` and the metadata model

mod connection;
mod descriptor;
mod dialect;
mod driver;
mod error;
mod pool;
mod schema;
pub mod security;
mod types;

pub use connection::*;
pub use descriptor::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use pool::*;
pub use schema::*;
pub use security::*;
pub use types::*;
