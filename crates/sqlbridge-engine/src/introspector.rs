//! Catalog reads on behalf of the UI and the migration generator
//!
//! Every call opens its own connection and closes it before returning.
//! Failures come back as schema introspection errors prefixed with the
//! operation that failed.

use crate::cache::TableListCache;
use sqlbridge_core::{
    BridgeError, ColumnDetail, Connection, ConnectionDescriptor, DbStats, EnumTypeInfo, Result,
    SchemaInfo, SchemaIntrospection, SchemaMap, TableInfo, TableMetadata, TableType,
};
use sqlbridge_drivers::DriverRegistry;
use std::sync::Arc;

pub struct MetadataIntrospector {
    registry: Arc<DriverRegistry>,
    cache: Arc<TableListCache>,
}

impl MetadataIntrospector {
    pub fn new(registry: Arc<DriverRegistry>, cache: Arc<TableListCache>) -> Self {
        Self { registry, cache }
    }

    pub fn cache(&self) -> &Arc<TableListCache> {
        &self.cache
    }

    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        descriptor.validate()?;
        let driver = self.registry.require(descriptor.dialect)?;
        driver.connect(descriptor).await
    }

    /// Close `connection` and pass `result` through, wrapped for `operation`
    async fn finish<T>(
        connection: Arc<dyn Connection>,
        result: Result<T>,
        operation: &str,
    ) -> Result<T> {
        if let Err(e) = connection.close().await {
            tracing::warn!(operation, error = %e, "Failed to close introspection connection");
        }
        result.map_err(|e| e.into_introspection(operation))
    }

    pub async fn list_schemas(&self, descriptor: &ConnectionDescriptor) -> Result<Vec<SchemaInfo>> {
        const OPERATION: &str = "Failed to list schemas";
        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(OPERATION))?;
        let result = match introspection(connection.as_ref()) {
            Ok(schema) => schema.list_schemas().await,
            Err(e) => Err(e),
        };
        Self::finish(connection, result, OPERATION).await
    }

    /// Tables of one schema, or of every user schema when `schema` is `None`.
    ///
    /// Only the unfiltered list is cached; a filtered request always reads
    /// the catalog.
    #[tracing::instrument(skip(self, descriptor), fields(key = %descriptor.cache_key()))]
    pub async fn list_tables(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
    ) -> Result<Vec<TableInfo>> {
        const OPERATION: &str = "Failed to list tables";
        let key = descriptor.cache_key();
        if schema.is_none()
            && let Some(tables) = self.cache.get(&key)
        {
            return Ok(tables);
        }

        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(OPERATION))?;
        let result = match introspection(connection.as_ref()) {
            Ok(introspection) => introspection.list_tables(schema).await,
            Err(e) => Err(e),
        };
        let tables = Self::finish(connection, result, OPERATION).await?;

        if schema.is_none() {
            self.cache.insert(key, tables.clone());
        }
        tracing::debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }

    pub async fn get_columns(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnDetail>> {
        let operation = format!("Failed to read columns of {}", table);
        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(&operation))?;
        let result = match introspection(connection.as_ref()) {
            Ok(introspection) => introspection.get_columns(schema, table).await,
            Err(e) => Err(e),
        };
        Self::finish(connection, result, &operation).await
    }

    pub async fn get_table_metadata(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableMetadata> {
        let operation = format!("Failed to read metadata of {}", table);
        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(&operation))?;
        let result = match introspection(connection.as_ref()) {
            Ok(introspection) => introspection.get_table_metadata(schema, table).await,
            Err(e) => Err(e),
        };
        Self::finish(connection, result, &operation).await
    }

    /// Metadata for every base table of `schema`, in catalog order, read
    /// over a single connection.
    #[tracing::instrument(skip(self, descriptor), fields(key = %descriptor.cache_key()))]
    pub async fn get_schema_map(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: &str,
    ) -> Result<SchemaMap> {
        let operation = format!("Failed to read schema {}", schema);
        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(&operation))?;
        let result = match introspection(connection.as_ref()) {
            Ok(introspection) => schema_map(introspection, schema).await,
            Err(e) => Err(e),
        };
        let map = Self::finish(connection, result, &operation).await?;
        tracing::debug!(tables = map.len(), "Read schema map");
        Ok(map)
    }

    pub async fn list_enum_types(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
    ) -> Result<Vec<EnumTypeInfo>> {
        const OPERATION: &str = "Failed to list enum types";
        if !descriptor.dialect.supports_enum_types() {
            return Ok(Vec::new());
        }
        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(OPERATION))?;
        let result = match introspection(connection.as_ref()) {
            Ok(introspection) => introspection.list_enum_types(schema).await,
            Err(e) => Err(e),
        };
        Self::finish(connection, result, OPERATION).await
    }

    pub async fn get_db_stats(&self, descriptor: &ConnectionDescriptor) -> Result<DbStats> {
        const OPERATION: &str = "Failed to read database statistics";
        let connection = self.open(descriptor).await.map_err(|e| e.into_introspection(OPERATION))?;
        let result = match introspection(connection.as_ref()) {
            Ok(introspection) => introspection.get_db_stats().await,
            Err(e) => Err(e),
        };
        Self::finish(connection, result, OPERATION).await
    }

    /// Forget the cached table list of this database
    pub fn invalidate_table_cache(&self, descriptor: &ConnectionDescriptor) -> bool {
        self.cache.invalidate(&descriptor.cache_key())
    }
}

fn introspection(connection: &dyn Connection) -> Result<&dyn SchemaIntrospection> {
    connection.as_schema_introspection().ok_or_else(|| {
        BridgeError::NotSupported(format!(
            "{} connections do not support schema introspection",
            connection.dialect().display_name()
        ))
    })
}

async fn schema_map(introspection: &dyn SchemaIntrospection, schema: &str) -> Result<SchemaMap> {
    let tables = introspection.list_tables(Some(schema)).await?;
    let mut map = SchemaMap::with_capacity(tables.len());
    for table in tables
        .into_iter()
        .filter(|t| t.table_type == TableType::Table)
    {
        let metadata = introspection.get_table_metadata(Some(schema), &table.name).await?;
        map.insert(table.name, metadata);
    }
    Ok(map)
}
