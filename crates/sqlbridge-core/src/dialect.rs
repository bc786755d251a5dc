//! SQL dialects understood by the engine
//!
//! The synthesizer and the drivers share one algorithm per concern; the
//! pieces that differ between engines (identifier quoting, a handful of
//! statement shapes, the session-id and kill primitives) live here.

use crate::{BackendId, BridgeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect family of a relational engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Postgres, Dialect::MySql];

    /// Stable identifier ("postgres", "mysql")
    pub fn id(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "PostgreSQL",
            Dialect::MySql => "MySQL",
        }
    }

    pub fn quote_char(&self) -> char {
        match self {
            Dialect::Postgres => '"',
            Dialect::MySql => '`',
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote_identifier(&self, name: &str) -> String {
        let quote = self.quote_char();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for ch in name.chars() {
            if ch == quote {
                quoted.push(quote);
            }
            quoted.push(ch);
        }
        quoted.push(quote);
        quoted
    }

    /// Quote a string literal with single quotes, doubling embedded ones
    pub fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// `schema.name` when a schema is given, otherwise just `name`
    pub fn qualify(&self, schema: Option<&str>, name: &str) -> String {
        match schema.filter(|s| !s.is_empty()) {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::MySql => 3306,
        }
    }

    /// Schema used when the caller does not name one
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => Some("public"),
            Dialect::MySql => None,
        }
    }

    /// Whether `CREATE TYPE ... AS ENUM` exists
    pub fn supports_enum_types(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Whether `CREATE INDEX ... USING <method>` selects an access method
    pub fn supports_index_methods(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Index access method the engine picks when none is given
    pub fn default_index_method(&self) -> &'static str {
        "btree"
    }

    /// Statement returning the server-side id of the current session
    pub fn backend_id_query(&self) -> &'static str {
        match self {
            Dialect::Postgres => "SELECT pg_backend_pid() AS backend_id",
            Dialect::MySql => "SELECT CONNECTION_ID() AS backend_id",
        }
    }

    /// Out-of-band statement that stops the query running on `id`.
    ///
    /// Must be issued from a different session than the one being stopped.
    pub fn cancel_statement(&self, id: BackendId) -> String {
        match self {
            Dialect::Postgres => format!("SELECT pg_cancel_backend({})", id.0),
            Dialect::MySql => format!("KILL QUERY {}", id.0),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Dialect {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            other => Err(BridgeError::NotSupported(format!(
                "unknown SQL dialect '{}'",
                other
            ))),
        }
    }
}
