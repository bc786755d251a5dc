//! Request shapes for the migration generators

use serde::{Deserialize, Serialize};
use sqlbridge_core::{Dialect, TableMetadata};
use sqlbridge_migrate::{BaselineSchema, DropMode};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableParams {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub metadata: TableMetadata,
    /// Migration name; `create_<table>` when absent
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateTableParams {
    pub fn migration_name(&self) -> String {
        migration_name(self.name.as_deref(), "create", &self.table)
    }
}

/// Operations stay untyped until the synthesizer parses them so an unknown
/// kind is reported as such rather than as a malformed request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterTableParams {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub operations: Vec<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
}

impl AlterTableParams {
    pub fn migration_name(&self) -> String {
        migration_name(self.name.as_deref(), "alter", &self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropTableParams {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default)]
    pub mode: DropMode,
    #[serde(default)]
    pub name: Option<String>,
}

impl DropTableParams {
    pub fn migration_name(&self) -> String {
        migration_name(self.name.as_deref(), "drop", &self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineParams {
    #[serde(default)]
    pub dialect: Dialect,
    pub schemas: Vec<BaselineSchema>,
}

fn migration_name(explicit: Option<&str>, verb: &str, table: &str) -> String {
    match explicit.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("{}_{}", verb, table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_names() {
        let params: DropTableParams =
            serde_json::from_value(json!({"table": "orders", "mode": "cascade"})).unwrap();
        assert_eq!(params.migration_name(), "drop_orders");
        assert_eq!(params.mode, DropMode::Cascade);
        assert_eq!(params.dialect, Dialect::Postgres);

        let params: AlterTableParams = serde_json::from_value(json!({
            "dialect": "mysql",
            "table": "orders",
            "operations": [{"type": "DROP_DEFAULT", "column": "status"}],
            "name": "  ",
        }))
        .unwrap();
        assert_eq!(params.migration_name(), "alter_orders");
        assert_eq!(params.dialect, Dialect::MySql);
    }

    #[test]
    fn test_explicit_name_wins() {
        let params: CreateTableParams = serde_json::from_value(json!({
            "schema": "public",
            "table": "users",
            "metadata": {"columns": [{"name": "id", "dataType": "integer"}]},
            "name": "add users",
        }))
        .unwrap();
        assert_eq!(params.migration_name(), "add users");
        assert_eq!(params.metadata.columns.len(), 1);
    }
}
