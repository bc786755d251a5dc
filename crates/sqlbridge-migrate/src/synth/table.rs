//! CREATE TABLE, CREATE INDEX and CREATE TYPE synthesis

use indexmap::IndexMap;
use sqlbridge_core::{ColumnDetail, EnumTypeInfo, IndexInfo, ReferentialAction, TableMetadata};

use super::{DdlScript, DdlSynthesizer};

impl DdlSynthesizer {
    /// `"name" type [NOT NULL] [DEFAULT expr]`
    pub fn column_definition(&self, column: &ColumnDetail) -> String {
        let mut def = format!("{} {}", self.quote(&column.name), column.data_type);
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = column.default_value.as_deref().map(str::trim)
            && !default.is_empty()
        {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }

    /// One `CREATE TABLE` statement: columns first, then primary key,
    /// unique, check and foreign key constraints in that order.
    pub fn create_table_sql(
        &self,
        schema: Option<&str>,
        table: &str,
        metadata: &TableMetadata,
    ) -> String {
        let mut lines: Vec<String> = metadata
            .columns
            .iter()
            .map(|column| self.column_definition(column))
            .collect();

        let primary_keys = primary_key_columns(metadata);
        if !primary_keys.is_empty() {
            lines.push(format!(
                "PRIMARY KEY ({})",
                self.quote_list(primary_keys.iter().map(String::as_str))
            ));
        }

        let mut uniques: IndexMap<&str, Vec<(i32, &str)>> = IndexMap::new();
        for unique in &metadata.unique_constraints {
            uniques
                .entry(unique.constraint_name.as_str())
                .or_default()
                .push((unique.ordinal_position, unique.column_name.as_str()));
        }
        for (name, mut columns) in uniques {
            columns.sort_by_key(|(ordinal, _)| *ordinal);
            lines.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote(name),
                self.quote_list(columns.into_iter().map(|(_, column)| column))
            ));
        }

        for check in &metadata.check_constraints {
            let clause = match (check.definition.as_deref(), check.check_clause.as_deref()) {
                (Some(definition), _) if !definition.trim().is_empty() => {
                    let definition = definition.trim();
                    if definition.to_ascii_uppercase().starts_with("CHECK") {
                        definition.to_string()
                    } else {
                        format!("CHECK ({})", definition)
                    }
                }
                (_, Some(clause)) if !clause.trim().is_empty() => {
                    format!("CHECK ({})", clause.trim())
                }
                _ => continue,
            };
            lines.push(format!("CONSTRAINT {} {}", self.quote(&check.constraint_name), clause));
        }

        let mut foreign_keys: IndexMap<&str, Vec<_>> = IndexMap::new();
        for fk in &metadata.foreign_keys {
            foreign_keys
                .entry(fk.constraint_name.as_str())
                .or_default()
                .push(fk);
        }
        for (name, mut parts) in foreign_keys {
            parts.sort_by_key(|fk| fk.ordinal_position);
            let first = parts[0];
            let mut clause = format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.quote(name),
                self.quote_list(parts.iter().map(|fk| fk.source_column.as_str())),
                self.qualified_name(Some(&first.target_schema), &first.target_table),
                self.quote_list(parts.iter().map(|fk| fk.target_column.as_str())),
            );
            if first.delete_rule != ReferentialAction::NoAction {
                clause.push_str(&format!(" ON DELETE {}", first.delete_rule));
            }
            if first.update_rule != ReferentialAction::NoAction {
                clause.push_str(&format!(" ON UPDATE {}", first.update_rule));
            }
            lines.push(clause);
        }

        format!(
            "CREATE TABLE {} (\n  {}\n);",
            self.qualified_name(schema, table),
            lines.join(",\n  ")
        )
    }

    /// `CREATE INDEX` for every index that is not backing a primary key or
    /// unique constraint.
    pub fn create_indexes_sql(
        &self,
        schema: Option<&str>,
        table: &str,
        indexes: &[IndexInfo],
    ) -> Vec<String> {
        let mut grouped: IndexMap<&str, Vec<&IndexInfo>> = IndexMap::new();
        for index in indexes {
            grouped.entry(index.index_name.as_str()).or_default().push(index);
        }

        let dialect = self.dialect();
        grouped
            .into_iter()
            .filter(|(_, parts)| !parts.iter().any(|i| i.is_primary || i.is_unique))
            .map(|(name, mut parts)| {
                parts.sort_by_key(|i| i.ordinal_position);
                let method = parts[0]
                    .index_type
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| {
                        dialect.supports_index_methods()
                            && !m.is_empty()
                            && !m.eq_ignore_ascii_case(dialect.default_index_method())
                    })
                    .map(|m| format!(" USING {}", m.to_ascii_lowercase()))
                    .unwrap_or_default();
                format!(
                    "CREATE INDEX {} ON {}{} ({});",
                    self.quote(name),
                    self.qualified_name(schema, table),
                    method,
                    self.quote_list(parts.iter().map(|i| i.column_name.as_str()))
                )
            })
            .collect()
    }

    /// One `CREATE TYPE ... AS ENUM` per (schema, name); nothing on
    /// dialects without enum types.
    pub fn create_enum_types_sql(&self, enums: &[EnumTypeInfo]) -> Vec<String> {
        if !self.dialect().supports_enum_types() {
            return Vec::new();
        }
        enum_groups(enums)
            .into_iter()
            .map(|((schema, name), mut labels)| {
                labels.sort_by(|a, b| a.sort_order.total_cmp(&b.sort_order));
                let values = labels
                    .iter()
                    .map(|label| self.dialect().quote_literal(&label.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    self.qualified_name(Some(schema), name),
                    values
                )
            })
            .collect()
    }

    /// Single-table migration: the table and its indexes, reversed by a
    /// plain drop.
    pub fn create_table_migration(
        &self,
        schema: Option<&str>,
        table: &str,
        metadata: &TableMetadata,
    ) -> DdlScript {
        let mut script = DdlScript::new();
        script.add_up(self.create_table_sql(schema, table, metadata));
        for index in self.create_indexes_sql(schema, table, &metadata.indexes) {
            script.add_up(index);
        }
        let if_exists = if self.config.use_if_exists { "IF EXISTS " } else { "" };
        script.add_down(format!(
            "DROP TABLE {}{};",
            if_exists,
            self.qualified_name(schema, table)
        ));
        script
    }
}

/// Primary key columns, falling back to the per-column flags when the
/// key list was not introspected.
fn primary_key_columns(metadata: &TableMetadata) -> Vec<String> {
    if !metadata.primary_keys.is_empty() {
        return metadata.primary_keys.clone();
    }
    let mut flagged: Vec<&ColumnDetail> =
        metadata.columns.iter().filter(|c| c.is_primary_key).collect();
    flagged.sort_by_key(|c| c.ordinal);
    flagged.into_iter().map(|c| c.name.clone()).collect()
}

pub(super) fn enum_groups(enums: &[EnumTypeInfo]) -> IndexMap<(&str, &str), Vec<&EnumTypeInfo>> {
    let mut groups: IndexMap<(&str, &str), Vec<&EnumTypeInfo>> = IndexMap::new();
    for label in enums {
        groups
            .entry((label.schema.as_str(), label.name.as_str()))
            .or_default()
            .push(label);
    }
    groups
}
