//! MySQL catalog introspection over `information_schema`
//!
//! A MySQL database plays the role of a schema; `None` resolves to the
//! database named in the descriptor.

use async_trait::async_trait;
use sqlbridge_core::{
    CheckConstraintInfo, ColumnDetail, Connection, DbStats, ForeignKeyInfo, IndexInfo,
    ReferentialAction, Result, Row, SchemaInfo, SchemaIntrospection, TableInfo, TableType,
    UniqueConstraintInfo, Value,
};

use crate::MySqlConnection;

const SYSTEM_SCHEMAS: &str = "('mysql', 'information_schema', 'performance_schema', 'sys')";

fn text(row: &Row, column: &str) -> String {
    row.get_string(column).unwrap_or_default()
}

fn int(row: &Row, column: &str) -> i32 {
    row.get_i64(column).unwrap_or_default() as i32
}

impl MySqlConnection {
    fn table_params(&self, schema: Option<&str>, table: &str) -> [Value; 2] {
        [
            Value::String(schema.unwrap_or(self.default_database()).to_string()),
            Value::String(table.to_string()),
        ]
    }
}

#[async_trait]
impl SchemaIntrospection for MySqlConnection {
    #[tracing::instrument(skip(self))]
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        let sql = format!(
            "SELECT SCHEMA_NAME AS name FROM information_schema.SCHEMATA
             WHERE SCHEMA_NAME NOT IN {} ORDER BY SCHEMA_NAME",
            SYSTEM_SCHEMAS
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
        let database = schema.unwrap_or(self.default_database()).to_string();
        let result = self
            .query(
                "SELECT TABLE_SCHEMA AS schema_name, TABLE_NAME AS table_name,
                        TABLE_TYPE AS table_type, TABLE_ROWS AS row_count,
                        DATA_LENGTH + INDEX_LENGTH AS size_bytes
                 FROM information_schema.TABLES
                 WHERE TABLE_SCHEMA = ?
                 ORDER BY TABLE_NAME",
                &[Value::String(database)],
            )
            .await?;

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
                "SELECT c.COLUMN_NAME AS column_name, c.COLUMN_TYPE AS data_type,
                        c.IS_NULLABLE AS is_nullable, c.COLUMN_DEFAULT AS column_default,
                        c.ORDINAL_POSITION AS ordinal,
                        c.COLUMN_KEY = 'PRI' AS is_primary_key,
                        EXISTS (SELECT 1 FROM information_schema.KEY_COLUMN_USAGE k
                                WHERE k.TABLE_SCHEMA = c.TABLE_SCHEMA
                                  AND k.TABLE_NAME = c.TABLE_NAME
                                  AND k.COLUMN_NAME = c.COLUMN_NAME
                                  AND k.REFERENCED_TABLE_NAME IS NOT NULL) AS is_foreign_key
                 FROM information_schema.COLUMNS c
                 WHERE c.TABLE_SCHEMA = ? AND c.TABLE_NAME = ?
                 ORDER BY c.ORDINAL_POSITION",
                &self.table_params(schema, table),
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
                "SELECT COLUMN_NAME AS column_name
                 FROM information_schema.KEY_COLUMN_USAGE
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
                 ORDER BY ORDINAL_POSITION",
                &self.table_params(schema, table),
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
                "SELECT k.CONSTRAINT_NAME AS constraint_name,
                        k.TABLE_SCHEMA AS source_schema, k.TABLE_NAME AS source_table,
                        k.COLUMN_NAME AS source_column,
                        k.REFERENCED_TABLE_SCHEMA AS target_schema,
                        k.REFERENCED_TABLE_NAME AS target_table,
                        k.REFERENCED_COLUMN_NAME AS target_column,
                        r.UPDATE_RULE AS update_rule, r.DELETE_RULE AS delete_rule,
                        k.ORDINAL_POSITION AS ordinal_position
                 FROM information_schema.KEY_COLUMN_USAGE k
                 JOIN information_schema.REFERENTIAL_CONSTRAINTS r
                   ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
                  AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
                  AND r.TABLE_NAME = k.TABLE_NAME
                 WHERE k.TABLE_SCHEMA = ? AND k.TABLE_NAME = ?
                   AND k.REFERENCED_TABLE_NAME IS NOT NULL
                 ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
                &self.table_params(schema, table),
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
                "SELECT INDEX_NAME AS index_name, COLUMN_NAME AS column_name,
                        NON_UNIQUE = 0 AS is_unique, INDEX_NAME = 'PRIMARY' AS is_primary,
                        LOWER(INDEX_TYPE) AS index_type, SEQ_IN_INDEX AS ordinal_position
                 FROM information_schema.STATISTICS
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND COLUMN_NAME IS NOT NULL
                 ORDER BY INDEX_NAME, SEQ_IN_INDEX",
                &self.table_params(schema, table),
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
                "SELECT tc.CONSTRAINT_NAME AS constraint_name, k.COLUMN_NAME AS column_name,
                        k.ORDINAL_POSITION AS ordinal_position
                 FROM information_schema.TABLE_CONSTRAINTS tc
                 JOIN information_schema.KEY_COLUMN_USAGE k
                   ON k.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                  AND k.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                  AND k.TABLE_NAME = tc.TABLE_NAME
                 WHERE tc.TABLE_SCHEMA = ? AND tc.TABLE_NAME = ?
                   AND tc.CONSTRAINT_TYPE = 'UNIQUE'
                 ORDER BY tc.CONSTRAINT_NAME, k.ORDINAL_POSITION",
                &self.table_params(schema, table),
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

    /// Needs MySQL 8.0.16 or later; older servers have no CHECK_CONSTRAINTS view.
    async fn get_check_constraints(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<CheckConstraintInfo>> {
        let result = self
            .query(
                "SELECT cc.CONSTRAINT_NAME AS constraint_name, cc.CHECK_CLAUSE AS check_clause
                 FROM information_schema.CHECK_CONSTRAINTS cc
                 JOIN information_schema.TABLE_CONSTRAINTS tc
                   ON tc.CONSTRAINT_SCHEMA = cc.CONSTRAINT_SCHEMA
                  AND tc.CONSTRAINT_NAME = cc.CONSTRAINT_NAME
                 WHERE tc.TABLE_SCHEMA = ? AND tc.TABLE_NAME = ?
                   AND tc.CONSTRAINT_TYPE = 'CHECK'
                 ORDER BY cc.CONSTRAINT_NAME",
                &self.table_params(schema, table),
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| CheckConstraintInfo {
                constraint_name: text(row, "constraint_name"),
                definition: None,
                check_clause: row.get_string("check_clause"),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_db_stats(&self) -> Result<DbStats> {
        let result = self
            .query(
                "SELECT COUNT(*) AS total_tables,
                        COALESCE(SUM(TABLE_ROWS), 0) AS total_rows,
                        COALESCE(SUM(DATA_LENGTH + INDEX_LENGTH), 0) / 1048576.0 AS total_size_mb
                 FROM information_schema.TABLES
                 WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'",
                &[Value::String(self.default_database().to_string())],
            )
            .await?;
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
