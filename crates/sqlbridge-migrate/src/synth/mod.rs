//! DDL synthesis
//!
//! Turns introspected [`TableMetadata`](sqlbridge_core::TableMetadata) into
//! dialect-correct SQL. Every generator returns a [`DdlScript`] whose down
//! half undoes the up half where that is possible and says so in a comment
//! where it is not.

mod alter;
mod baseline;
mod drop;
mod script;
mod table;


pub use alter::AlterOperation;
pub use baseline::BaselineSchema;
pub use drop::DropMode;
pub use script::DdlScript;

use sqlbridge_core::Dialect;

/// Configuration for DDL synthesis
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationConfig {
    pub dialect: Dialect,
    /// Emit `IF EXISTS` on the DROP TABLE that reverses a CREATE TABLE
    pub use_if_exists: bool,
}

impl MigrationConfig {
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_if_exists(mut self, use_if_exists: bool) -> Self {
        self.use_if_exists = use_if_exists;
        self
    }
}

/// Generator for migration SQL
#[derive(Debug, Clone, Default)]
pub struct DdlSynthesizer {
    config: MigrationConfig,
}

impl DdlSynthesizer {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_config(MigrationConfig::for_dialect(dialect))
    }

    pub fn with_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    fn quote(&self, name: &str) -> String {
        self.config.dialect.quote_identifier(name)
    }

    fn qualified_name(&self, schema: Option<&str>, name: &str) -> String {
        self.config.dialect.qualify(schema, name)
    }

    fn quote_list<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> String {
        names
            .into_iter()
            .map(|name| self.quote(name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Down statement for an operation that cannot be reversed from metadata
fn manual_intervention(what: &str) -> String {
    format!("-- Manual intervention required: {} cannot be reversed automatically", what)
}
