use serde::{Deserialize, Serialize};
use sqlbridge_core::{EnumTypeInfo, SchemaMap};

use super::table::enum_groups;
use super::{DdlScript, DdlSynthesizer};
use crate::order;

/// Everything a baseline needs to know about one schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaselineSchema {
    pub name: String,
    pub tables: SchemaMap,
    pub enum_types: Vec<EnumTypeInfo>,
}

impl BaselineSchema {
    pub fn new(name: impl Into<String>, tables: SchemaMap) -> Self {
        Self {
            name: name.into(),
            tables,
            enum_types: Vec::new(),
        }
    }

    pub fn with_enum_types(mut self, enum_types: Vec<EnumTypeInfo>) -> Self {
        self.enum_types = enum_types;
        self
    }
}

impl DdlSynthesizer {
    /// Recreate whole schemas from scratch.
    ///
    /// Per schema: enum types, then tables in foreign-key order, each
    /// followed by its secondary indexes. The down half drops every table
    /// in reverse creation order, then the enum types.
    pub fn baseline_migration(&self, schemas: &[BaselineSchema]) -> DdlScript {
        let mut script = DdlScript::new();
        let mut created_tables = Vec::new();
        let mut created_types = Vec::new();

        for schema in schemas {
            let schema_name = Some(schema.name.as_str()).filter(|s| !s.is_empty());

            for statement in self.create_enum_types_sql(&schema.enum_types) {
                script.add_up(statement);
            }
            if self.dialect().supports_enum_types() {
                for (enum_schema, enum_name) in enum_groups(&schema.enum_types).keys() {
                    created_types.push(self.qualified_name(Some(*enum_schema), enum_name));
                }
            }

            for table in order(&schema.name, &schema.tables) {
                let Some(metadata) = schema.tables.get(&table) else {
                    continue;
                };
                script.add_up(self.create_table_sql(schema_name, &table, metadata));
                for index in self.create_indexes_sql(schema_name, &table, &metadata.indexes) {
                    script.add_up(index);
                }
                created_tables.push(self.qualified_name(schema_name, &table));
            }
        }

        for table in created_tables.iter().rev() {
            script.add_down(format!("DROP TABLE {} CASCADE;", table));
        }
        for enum_type in &created_types {
            script.add_down(format!("DROP TYPE {} CASCADE;", enum_type));
        }
        script
    }
}
