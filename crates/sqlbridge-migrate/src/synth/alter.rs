//! ALTER TABLE synthesis

use serde::{Deserialize, Serialize};
use sqlbridge_core::{ColumnDetail, Dialect};

use super::{DdlScript, DdlSynthesizer, manual_intervention};
use crate::{MigrationError, MigrationResult};

/// One structural change to an existing table.
///
/// On the wire an operation is an object tagged by `type`, e.g.
/// `{"type": "SET_NOT_NULL", "column": "email"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum AlterOperation {
    AddColumn {
        column: ColumnDetail,
    },
    DropColumn {
        column: String,
    },
    RenameColumn {
        from: String,
        to: String,
    },
    ChangeType {
        column: String,
        new_type: String,
    },
    /// MySQL can only change nullability by restating the column type
    SetNotNull {
        column: String,
        #[serde(default)]
        data_type: Option<String>,
    },
    DropNotNull {
        column: String,
        #[serde(default)]
        data_type: Option<String>,
    },
    SetDefault {
        column: String,
        default: String,
    },
    DropDefault {
        column: String,
    },
}

impl AlterOperation {
    pub const KINDS: [&'static str; 8] = [
        "ADD_COLUMN",
        "DROP_COLUMN",
        "RENAME_COLUMN",
        "CHANGE_TYPE",
        "SET_NOT_NULL",
        "DROP_NOT_NULL",
        "SET_DEFAULT",
        "DROP_DEFAULT",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            AlterOperation::AddColumn { .. } => "ADD_COLUMN",
            AlterOperation::DropColumn { .. } => "DROP_COLUMN",
            AlterOperation::RenameColumn { .. } => "RENAME_COLUMN",
            AlterOperation::ChangeType { .. } => "CHANGE_TYPE",
            AlterOperation::SetNotNull { .. } => "SET_NOT_NULL",
            AlterOperation::DropNotNull { .. } => "DROP_NOT_NULL",
            AlterOperation::SetDefault { .. } => "SET_DEFAULT",
            AlterOperation::DropDefault { .. } => "DROP_DEFAULT",
        }
    }

    /// Whether the down statement can restore the previous definition
    pub fn is_reversible(&self) -> bool {
        !matches!(
            self,
            AlterOperation::DropColumn { .. }
                | AlterOperation::ChangeType { .. }
                | AlterOperation::DropDefault { .. }
        )
    }

    /// Parse one operation, telling an unknown `type` apart from a
    /// malformed body.
    pub fn from_json(value: serde_json::Value) -> MigrationResult<Self> {
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                MigrationError::InvalidOperation("operation has no \"type\" tag".to_string())
            })?;
        if !Self::KINDS.contains(&kind.as_str()) {
            return Err(MigrationError::UnknownOperation(kind));
        }
        serde_json::from_value(value)
            .map_err(|e| MigrationError::InvalidOperation(format!("{}: {}", kind, e)))
    }
}

fn require_name<'a>(kind: &str, what: &str, name: &'a str) -> MigrationResult<&'a str> {
    if name.trim().is_empty() {
        return Err(MigrationError::InvalidOperation(format!(
            "{} requires a non-empty {}",
            kind, what
        )));
    }
    Ok(name)
}

impl DdlSynthesizer {
    /// Up statements in the given order; down statements undo them last
    /// first.
    pub fn alter_table_migration(
        &self,
        schema: Option<&str>,
        table: &str,
        operations: &[AlterOperation],
    ) -> MigrationResult<DdlScript> {
        if operations.is_empty() {
            return Err(MigrationError::InvalidOperation(
                "alter table requires at least one operation".to_string(),
            ));
        }

        let table_name = self.qualified_name(schema, table);
        let mut script = DdlScript::new();
        let mut downs = Vec::with_capacity(operations.len());
        for operation in operations {
            let (up, down) = self.alter_statement(&table_name, operation)?;
            script.add_up(up);
            downs.push(down);
        }
        for down in downs.into_iter().rev() {
            script.add_down(down);
        }
        Ok(script)
    }

    fn alter_statement(
        &self,
        table: &str,
        operation: &AlterOperation,
    ) -> MigrationResult<(String, String)> {
        let kind = operation.kind();
        let statements = match operation {
            AlterOperation::AddColumn { column } => {
                let name = self.quote(require_name(kind, "column name", &column.name)?);
                if column.data_type.trim().is_empty() {
                    return Err(MigrationError::InvalidOperation(format!(
                        "{} requires a data type for column {}",
                        kind, name
                    )));
                }
                (
                    format!("ALTER TABLE {} ADD COLUMN {};", table, self.column_definition(column)),
                    format!("ALTER TABLE {} DROP COLUMN {};", table, name),
                )
            }
            AlterOperation::DropColumn { column } => {
                let name = self.quote(require_name(kind, "column", column)?);
                (
                    format!("ALTER TABLE {} DROP COLUMN {};", table, name),
                    manual_intervention(&format!("dropping column {} from {}", name, table)),
                )
            }
            AlterOperation::RenameColumn { from, to } => {
                let from = self.quote(require_name(kind, "source column", from)?);
                let to = self.quote(require_name(kind, "target column", to)?);
                (
                    format!("ALTER TABLE {} RENAME COLUMN {} TO {};", table, from, to),
                    format!("ALTER TABLE {} RENAME COLUMN {} TO {};", table, to, from),
                )
            }
            AlterOperation::ChangeType { column, new_type } => {
                let name = self.quote(require_name(kind, "column", column)?);
                let new_type = require_name(kind, "type", new_type)?;
                let up = match self.dialect() {
                    Dialect::Postgres => {
                        format!("ALTER TABLE {} ALTER COLUMN {} TYPE {};", table, name, new_type)
                    }
                    Dialect::MySql => {
                        format!("ALTER TABLE {} MODIFY COLUMN {} {};", table, name, new_type)
                    }
                };
                (
                    up,
                    manual_intervention(&format!(
                        "changing the type of column {} on {}",
                        name, table
                    )),
                )
            }
            AlterOperation::SetNotNull { column, data_type } => {
                let name = self.quote(require_name(kind, "column", column)?);
                (
                    self.nullability(kind, table, &name, data_type.as_deref(), false)?,
                    self.nullability(kind, table, &name, data_type.as_deref(), true)?,
                )
            }
            AlterOperation::DropNotNull { column, data_type } => {
                let name = self.quote(require_name(kind, "column", column)?);
                (
                    self.nullability(kind, table, &name, data_type.as_deref(), true)?,
                    self.nullability(kind, table, &name, data_type.as_deref(), false)?,
                )
            }
            AlterOperation::SetDefault { column, default } => {
                let name = self.quote(require_name(kind, "column", column)?);
                let default = require_name(kind, "default expression", default)?.trim();
                (
                    format!("ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};", table, name, default),
                    format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;", table, name),
                )
            }
            AlterOperation::DropDefault { column } => {
                let name = self.quote(require_name(kind, "column", column)?);
                (
                    format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;", table, name),
                    manual_intervention(&format!(
                        "dropping the default of column {} on {}",
                        name, table
                    )),
                )
            }
        };
        Ok(statements)
    }

    fn nullability(
        &self,
        kind: &str,
        table: &str,
        column: &str,
        data_type: Option<&str>,
        nullable: bool,
    ) -> MigrationResult<String> {
        match self.dialect() {
            Dialect::Postgres => Ok(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                table,
                column,
                if nullable { "DROP" } else { "SET" }
            )),
            Dialect::MySql => {
                let data_type = data_type
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        MigrationError::InvalidOperation(format!(
                            "{} on MySQL requires the column's dataType",
                            kind
                        ))
                    })?;
                Ok(format!(
                    "ALTER TABLE {} MODIFY COLUMN {} {} {};",
                    table,
                    column,
                    data_type,
                    if nullable { "NULL" } else { "NOT NULL" }
                ))
            }
        }
    }
}
