//! PostgreSQL catalog introspection
//!
//! Reads `pg_catalog` directly rather than `information_schema` so key
//! ordinals, index access methods and enum labels come back in one pass.

use async_trait::async_trait;
use sqlbridge_core::{
    CheckConstraintInfo, ColumnDetail, Connection, DbStats, EnumTypeInfo, ForeignKeyInfo,
    IndexInfo, ReferentialAction, Result, Row, SchemaInfo, SchemaIntrospection, TableInfo,
    TableType, UniqueConstraintInfo, Value,
};

use crate::PostgresConnection;

const USER_SCHEMAS: &str = "n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast') \
     AND n.nspname NOT LIKE 'pg_temp_%' AND n.nspname NOT LIKE 'pg_toast_temp_%'";

fn text(row: &Row, column: &str) -> String {
    row.get_string(column).unwrap_or_default()
}

fn int(row: &Row, column: &str) -> i32 {
    row.get_i64(column).unwrap_or_default() as i32
}

/// Bind parameters for a (schema, table) pair, defaulting to `public`
fn table_params(schema: Option<&str>, table: &str) -> [Value; 2] {
    [
        Value::String(schema.unwrap_or("public").to_string()),
        Value::String(table.to_string()),
    ]
}

fn optional_schema(schema: Option<&str>) -> [Value; 1] {
    [schema.map_or(Value::Null, |s| Value::String(s.to_string()))]
}

#[async_trait]
impl SchemaIntrospection for PostgresConnection {
    #[tracing::instrument(skip(self))]
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        let sql = format!(
            "SELECT n.nspname AS name FROM pg_namespace n WHERE {} ORDER BY n.nspname",
            USER_SCHEMAS
        );
        let result = self.query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| SchemaInfo {
                name: text(row, "name"),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>> {
        let sql = format!(
            "SELECT n.nspname AS schema_name, c.relname AS table_name,
                    CASE c.relkind
                        WHEN 'r' THEN 'BASE TABLE' WHEN 'p' THEN 'BASE TABLE'
                        WHEN 'v' THEN 'VIEW' WHEN 'm' THEN 'MATERIALIZED VIEW'
                        WHEN 'f' THEN 'FOREIGN TABLE' ELSE 'OTHER'
                    END AS table_type,
                    GREATEST(c.reltuples, 0)::int8 AS row_count,
                    pg_total_relation_size(c.oid)::int8 AS size_bytes
             FROM pg_class c
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f') AND NOT c.relispartition
               AND {}
               AND ($1::text IS NULL OR n.nspname = $1::text)
             ORDER BY n.nspname, c.relname",
            USER_SCHEMAS
        );
        let result = self.query(&sql, &optional_schema(schema)).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: row.get_string("schema_name"),
                name: text(row, "table_name"),
                table_type: TableType::from_catalog(&text(row, "table_type")),
                row_count: row.get_i64("row_count"),
                size_bytes: row.get_i64("size_bytes"),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnDetail>> {
        let result = self
            .query(
                "SELECT a.attname AS column_name,
                        format_type(a.atttypid, a.atttypmod) AS data_type,
                        NOT a.attnotnull AS is_nullable,
                        pg_get_expr(d.adbin, d.adrelid) AS column_default,
                        a.attnum::int4 AS ordinal,
                        EXISTS (SELECT 1 FROM pg_constraint pk
                                WHERE pk.conrelid = c.oid AND pk.contype = 'p'
                                  AND a.attnum = ANY (pk.conkey)) AS is_primary_key,
                        EXISTS (SELECT 1 FROM pg_constraint fk
                                WHERE fk.conrelid = c.oid AND fk.contype = 'f'
                                  AND a.attnum = ANY (fk.conkey)) AS is_foreign_key
                 FROM pg_attribute a
                 JOIN pg_class c ON c.oid = a.attrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
                 WHERE n.nspname = $1::text AND c.relname = $2::text
                   AND a.attnum > 0 AND NOT a.attisdropped
                 ORDER BY a.attnum",
                &table_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnDetail {
                name: text(row, "column_name"),
                data_type: text(row, "data_type"),
                nullable: row.get_bool("is_nullable").unwrap_or(true),
                default_value: row.get_string("column_default"),
                is_primary_key: row.get_bool("is_primary_key").unwrap_or(false),
                is_foreign_key: row.get_bool("is_foreign_key").unwrap_or(false),
                ordinal: int(row, "ordinal"),
            })
            .collect())
    }

    async fn get_primary_keys(&self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let result = self
            .query(
                "SELECT a.attname AS column_name
                 FROM pg_constraint con
                 JOIN pg_class c ON c.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
                 JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
                 WHERE con.contype = 'p' AND n.nspname = $1::text AND c.relname = $2::text
                 ORDER BY k.ord",
                &table_params(schema, table),
            )
            .await?;
        Ok(result.rows.iter().map(|row| text(row, "column_name")).collect())
    }

    async fn get_foreign_keys(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>> {
        let result = self
            .query(
                "SELECT con.conname AS constraint_name,
                        sn.nspname AS source_schema, sc.relname AS source_table,
                        sa.attname AS source_column,
                        tn.nspname AS target_schema, tc.relname AS target_table,
                        ta.attname AS target_column,
                        con.confupdtype::text AS update_rule,
                        con.confdeltype::text AS delete_rule,
                        k.ord::int4 AS ordinal_position
                 FROM pg_constraint con
                 JOIN pg_class sc ON sc.oid = con.conrelid
                 JOIN pg_namespace sn ON sn.oid = sc.relnamespace
                 JOIN pg_class tc ON tc.oid = con.confrelid
                 JOIN pg_namespace tn ON tn.oid = tc.relnamespace
                 CROSS JOIN LATERAL unnest(con.conkey, con.confkey)
                     WITH ORDINALITY AS k(source_attnum, target_attnum, ord)
                 JOIN pg_attribute sa ON sa.attrelid = sc.oid AND sa.attnum = k.source_attnum
                 JOIN pg_attribute ta ON ta.attrelid = tc.oid AND ta.attnum = k.target_attnum
                 WHERE con.contype = 'f' AND sn.nspname = $1::text AND sc.relname = $2::text
                 ORDER BY con.conname, k.ord",
                &table_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ForeignKeyInfo {
                constraint_name: text(row, "constraint_name"),
                source_schema: text(row, "source_schema"),
                source_table: text(row, "source_table"),
                source_column: text(row, "source_column"),
                target_schema: text(row, "target_schema"),
                target_table: text(row, "target_table"),
                target_column: text(row, "target_column"),
                update_rule: ReferentialAction::from_catalog(&text(row, "update_rule")),
                delete_rule: ReferentialAction::from_catalog(&text(row, "delete_rule")),
                ordinal_position: int(row, "ordinal_position"),
            })
            .collect())
    }

    async fn get_indexes(&self, schema: Option<&str>, table: &str) -> Result<Vec<IndexInfo>> {
        let result = self
            .query(
                "SELECT i.relname AS index_name, a.attname AS column_name,
                        ix.indisunique AS is_unique, ix.indisprimary AS is_primary,
                        am.amname AS index_type, k.ord::int4 AS ordinal_position
                 FROM pg_index ix
                 JOIN pg_class t ON t.oid = ix.indrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 JOIN pg_class i ON i.oid = ix.indexrelid
                 JOIN pg_am am ON am.oid = i.relam
                 CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
                 WHERE n.nspname = $1::text AND t.relname = $2::text
                 ORDER BY i.relname, k.ord",
                &table_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| IndexInfo {
                index_name: text(row, "index_name"),
                column_name: text(row, "column_name"),
                is_unique: row.get_bool("is_unique").unwrap_or(false),
                is_primary: row.get_bool("is_primary").unwrap_or(false),
                index_type: row.get_string("index_type"),
                ordinal_position: int(row, "ordinal_position"),
            })
            .collect())
    }

    async fn get_unique_constraints(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<UniqueConstraintInfo>> {
        let result = self
            .query(
                "SELECT con.conname AS constraint_name, a.attname AS column_name,
                        k.ord::int4 AS ordinal_position
                 FROM pg_constraint con
                 JOIN pg_class c ON c.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
                 JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
                 WHERE con.contype = 'u' AND n.nspname = $1::text AND c.relname = $2::text
                 ORDER BY con.conname, k.ord",
                &table_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| UniqueConstraintInfo {
                constraint_name: text(row, "constraint_name"),
                column_name: text(row, "column_name"),
                ordinal_position: int(row, "ordinal_position"),
            })
            .collect())
    }

    async fn get_check_constraints(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<CheckConstraintInfo>> {
        let result = self
            .query(
                "SELECT con.conname AS constraint_name,
                        pg_get_constraintdef(con.oid) AS definition
                 FROM pg_constraint con
                 JOIN pg_class c ON c.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE con.contype = 'c' AND n.nspname = $1::text AND c.relname = $2::text
                 ORDER BY con.conname",
                &table_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| CheckConstraintInfo {
                constraint_name: text(row, "constraint_name"),
                definition: row.get_string("definition"),
                check_clause: None,
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn list_enum_types(&self, schema: Option<&str>) -> Result<Vec<EnumTypeInfo>> {
        let sql = format!(
            "SELECT n.nspname AS schema_name, t.typname AS enum_name,
                    e.enumlabel AS enum_value, e.enumsortorder::float8 AS sort_order
             FROM pg_type t
             JOIN pg_enum e ON e.enumtypid = t.oid
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE {} AND ($1::text IS NULL OR n.nspname = $1::text)
             ORDER BY n.nspname, t.typname, e.enumsortorder",
            USER_SCHEMAS
        );
        let result = self.query(&sql, &optional_schema(schema)).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| EnumTypeInfo {
                schema: text(row, "schema_name"),
                name: text(row, "enum_name"),
                value: text(row, "enum_value"),
                sort_order: row
                    .get_by_name("sort_order")
                    .and_then(Value::as_f64)
                    .unwrap_or_default(),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_db_stats(&self) -> Result<DbStats> {
        let sql = format!(
            "SELECT COUNT(*)::int8 AS total_tables,
                    COALESCE(SUM(GREATEST(c.reltuples, 0)), 0)::int8 AS total_rows,
                    pg_database_size(current_database())::float8 / 1048576.0 AS total_size_mb
             FROM pg_class c
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE c.relkind IN ('r', 'p') AND {}",
            USER_SCHEMAS
        );
        let result = self.query(&sql, &[]).await?;
        let Some(row) = result.rows.first() else {
            return Ok(DbStats::default());
        };
        Ok(DbStats {
            total_tables: row.get_i64("total_tables").unwrap_or_default(),
            total_rows: row.get_i64("total_rows").unwrap_or_default(),
            total_size_mb: row
                .get_by_name("total_size_mb")
                .and_then(Value::as_f64)
                .unwrap_or_default(),
        })
    }
}
