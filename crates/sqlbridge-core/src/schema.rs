//! Schema introspection trait and the metadata model
//!
//! Rows here mirror the catalog views they come from: one
//! `ForeignKeyInfo` per key column, one `IndexInfo` per indexed column,
//! one `EnumTypeInfo` per enum label. Consumers group them by name.

use crate::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog queries for one connection
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// User schemas, system schemas excluded
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>>;

    /// Tables and views, optionally restricted to one schema
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>>;

    /// Columns in ordinal order with key flags filled in
    async fn get_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnDetail>>;

    /// Primary key column names in key order
    async fn get_primary_keys(&self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;

    async fn get_foreign_keys(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>>;

    async fn get_indexes(&self, schema: Option<&str>, table: &str) -> Result<Vec<IndexInfo>>;

    async fn get_unique_constraints(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<UniqueConstraintInfo>>;

    async fn get_check_constraints(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<CheckConstraintInfo>>;

    /// Enum labels; dialects without enum types return nothing
    async fn list_enum_types(&self, _schema: Option<&str>) -> Result<Vec<EnumTypeInfo>> {
        Ok(Vec::new())
    }

    async fn get_db_stats(&self) -> Result<DbStats>;

    /// Everything the DDL synthesizer needs for one table
    async fn get_table_metadata(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableMetadata> {
        Ok(TableMetadata {
            columns: self.get_columns(schema, table).await?,
            primary_keys: self.get_primary_keys(schema, table).await?,
            foreign_keys: self.get_foreign_keys(schema, table).await?,
            indexes: self.get_indexes(schema, table).await?,
            unique_constraints: self.get_unique_constraints(schema, table).await?,
            check_constraints: self.get_check_constraints(schema, table).await?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
}

/// Table information (basic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub schema: Option<String>,
    pub name: String,
    pub table_type: TableType,
    /// Planner estimate, not an exact count
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    View,
    MaterializedView,
    ForeignTable,
    Other,
}

impl TableType {
    /// Map an `information_schema.tables.table_type` value
    pub fn from_catalog(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "BASE TABLE" | "TABLE" => TableType::Table,
            "VIEW" | "SYSTEM VIEW" => TableType::View,
            "MATERIALIZED VIEW" => TableType::MaterializedView,
            "FOREIGN" | "FOREIGN TABLE" => TableType::ForeignTable,
            _ => TableType::Other,
        }
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDetail {
    pub name: String,
    /// Full type as the engine prints it, e.g. `character varying(255)`
    pub data_type: String,
    #[serde(default = "nullable_by_default")]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    /// 1-based position in the table
    #[serde(default)]
    pub ordinal: i32,
}

fn nullable_by_default() -> bool {
    true
}

impl ColumnDetail {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            ..Default::default()
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(expr.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }
}

/// Referential action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    /// Parse a rule as spelled by `information_schema` or by the
    /// single-letter codes of `pg_constraint`. Unknown text is `NO ACTION`.
    pub fn from_catalog(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RESTRICT" | "R" => ReferentialAction::Restrict,
            "CASCADE" | "C" => ReferentialAction::Cascade,
            "SET NULL" | "N" => ReferentialAction::SetNull,
            "SET DEFAULT" | "D" => ReferentialAction::SetDefault,
            _ => ReferentialAction::NoAction,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column of a foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_column: String,
    pub target_schema: String,
    pub target_table: String,
    pub target_column: String,
    #[serde(default)]
    pub update_rule: ReferentialAction,
    #[serde(default)]
    pub delete_rule: ReferentialAction,
    /// 1-based position of this column within the constraint
    pub ordinal_position: i32,
}

/// One column of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub index_name: String,
    pub column_name: String,
    pub is_unique: bool,
    pub is_primary: bool,
    /// Access method, e.g. `btree`, `gin`
    pub index_type: Option<String>,
    pub ordinal_position: i32,
}

/// One column of a UNIQUE constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueConstraintInfo {
    pub constraint_name: String,
    pub column_name: String,
    pub ordinal_position: i32,
}

/// A CHECK constraint.
///
/// Postgres reports the full `CHECK (...)` text as `definition`;
/// `information_schema` only has the bare `check_clause`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConstraintInfo {
    pub constraint_name: String,
    pub definition: Option<String>,
    pub check_clause: Option<String>,
}

/// One label of an enum type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumTypeInfo {
    pub schema: String,
    pub name: String,
    pub value: String,
    pub sort_order: f64,
}

/// Everything known about one table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableMetadata {
    pub columns: Vec<ColumnDetail>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    pub indexes: Vec<IndexInfo>,
    pub unique_constraints: Vec<UniqueConstraintInfo>,
    pub check_constraints: Vec<CheckConstraintInfo>,
}

/// Table name to metadata within one schema
pub type SchemaMap = IndexMap<String, TableMetadata>;

/// Database-wide size figures
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub total_tables: i64,
    pub total_rows: i64,
    pub total_size_mb: f64,
}
