//! sqlbridge migrate - DDL synthesis for reversible migrations
//!
//! Everything here is a pure transform from introspected metadata to SQL
//! text, plus the thin file store that persists the result:
//!
//! - [`DdlSynthesizer`] - CREATE/ALTER/DROP and full-schema baselines
//! - [`order`] - foreign-key aware table ordering within a schema
//! - [`Migration`] - a versioned up/down pair with a content checksum
//! - [`write_migration_file`] / [`read_migration_file`] / [`list_migrations`]

mod error;
mod files;
mod migration;
mod order;
mod synth;

pub use error::{MigrationError, MigrationResult};
pub use files::{list_migrations, read_migration_file, write_migration_file};
pub use migration::{Migration, sanitize_name};
pub use order::{TableOrder, order, order_with_diagnostics};
pub use synth::{AlterOperation, BaselineSchema, DdlScript, DdlSynthesizer, DropMode, MigrationConfig};
