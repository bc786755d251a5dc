//! The operations the UI calls, in one place
//!
//! [`DataEngine`] resolves drivers by dialect, starts and tracks streams
//! by caller-supplied session id, forwards catalog reads to the
//! introspector and turns migration requests into [`Migration`] records.

use crate::cache::TableListCache;
use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventBatchSink, EventSink};
use crate::executor::{BatchSink, ExecutorOptions, StreamHandle, StreamSummary, StreamingExecutor};
use crate::introspector::MetadataIntrospector;
use crate::params::{AlterTableParams, CreateTableParams, DropTableParams};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlbridge_core::{
    BridgeError, ColumnDetail, ConnectionDescriptor, DbStats, Dialect, EnumTypeInfo, Result,
    SchemaInfo, SchemaMap, TableInfo, TableMetadata,
};
use sqlbridge_drivers::DriverRegistry;
use sqlbridge_migrate::{
    AlterOperation, BaselineSchema, DdlSynthesizer, Migration, MigrationResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Outcome of [`DataEngine::test_connection`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Up and down SQL of a baseline, as one script each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineMigration {
    #[serde(rename = "upSQL")]
    pub up_sql: String,
    #[serde(rename = "downSQL")]
    pub down_sql: String,
}

type SessionRegistry = Arc<RwLock<HashMap<String, CancelHandle>>>;

pub struct DataEngine {
    config: EngineConfig,
    registry: Arc<DriverRegistry>,
    introspector: MetadataIntrospector,
    sessions: SessionRegistry,
}

impl DataEngine {
    /// Engine with every compiled-in driver
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(DriverRegistry::with_defaults()))
    }

    /// Engine resolving drivers through `registry`
    ///
    /// # Arguments
    ///
    /// * `config` - Timeouts, cache TTL and defaults; validated here
    /// * `registry` - Drivers keyed by dialect
    pub fn with_registry(config: EngineConfig, registry: Arc<DriverRegistry>) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(TableListCache::new(config.table_cache_ttl()));
        let introspector = MetadataIntrospector::new(Arc::clone(&registry), cache);
        tracing::debug!(
            drivers = ?registry.list(),
            stream_timeout_secs = config.stream_timeout_secs,
            "Data engine ready"
        );
        Ok(Self {
            config,
            registry,
            introspector,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    pub fn table_cache(&self) -> &Arc<TableListCache> {
        self.introspector.cache()
    }

    /// Connect, run a trivial query and disconnect. Failures are reported
    /// in the result rather than as an error.
    #[tracing::instrument(skip(self, descriptor), fields(dialect = %descriptor.dialect, host = %descriptor.host))]
    pub async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ConnectionTestResult {
        let outcome = match descriptor.validate() {
            Ok(()) => match self.registry.require(descriptor.dialect) {
                Ok(driver) => driver.test_connection(descriptor).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                tracing::info!("Connection test succeeded");
                ConnectionTestResult {
                    ok: true,
                    message: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connection test failed");
                ConnectionTestResult {
                    ok: false,
                    message: Some(e.to_string()),
                }
            }
        }
    }

    /// Start streaming `sql` under `session_id`.
    ///
    /// The session can be cancelled through [`cancel_query`](Self::cancel_query)
    /// until it settles, at which point it is forgotten. A session id that
    /// is still streaming cannot be reused.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream_query(
        &self,
        session_id: &str,
        descriptor: ConnectionDescriptor,
        sql: &str,
        batch_size: Option<usize>,
        sink: Arc<dyn BatchSink>,
    ) -> Result<StreamHandle> {
        let driver = self.registry.require(descriptor.dialect)?;
        let mut options = ExecutorOptions::from_config(&self.config);
        if let Some(batch_size) = batch_size {
            options = options.with_batch_size(batch_size);
        }
        let executor = StreamingExecutor::new(driver, options);

        let handle = {
            let mut sessions = self.sessions.write();
            if sessions
                .get(session_id)
                .is_some_and(|existing| !existing.session().is_settled())
            {
                return Err(BridgeError::Configuration(format!(
                    "session {} is already streaming",
                    session_id
                )));
            }
            let handle = executor.start(session_id, descriptor, sql, sink)?;
            sessions.insert(session_id.to_string(), handle.cancel_handle());
            handle
        };

        let sessions = Arc::clone(&self.sessions);
        let session = Arc::clone(handle.session());
        tokio::spawn(async move {
            session.settled().await;
            let mut sessions = sessions.write();
            if sessions
                .get(session.id())
                .is_some_and(|entry| Arc::ptr_eq(entry.session(), &session))
            {
                sessions.remove(session.id());
            }
        });

        Ok(handle)
    }

    /// Stream `sql` as `batch`/`progress`/`done` events, and an `error`
    /// event if the stream fails or is cancelled.
    ///
    /// The returned task resolves with the stream's outcome; it can be
    /// dropped without stopping the stream.
    pub fn stream_to_events(
        &self,
        session_id: &str,
        descriptor: ConnectionDescriptor,
        sql: &str,
        batch_size: Option<usize>,
        events: Arc<dyn EventSink>,
    ) -> Result<JoinHandle<Result<StreamSummary>>> {
        let sink = Arc::new(EventBatchSink::new(session_id, Arc::clone(&events)));
        let handle = self.stream_query(session_id, descriptor, sql, batch_size, sink)?;
        let session_id = session_id.to_string();
        Ok(tokio::spawn(async move {
            let result = handle.completion().await;
            if let Err(e) = &result
                && let Err(emit_error) = events.emit(EngineEvent::error(&session_id, e)).await
            {
                tracing::warn!(session_id = %session_id, error = %emit_error, "Failed to report stream error");
            }
            result
        }))
    }

    /// Cancel the stream registered under `session_id`.
    ///
    /// Returns false when no such stream is running.
    pub async fn cancel_query(&self, session_id: &str) -> bool {
        let handle = self.sessions.read().get(session_id).cloned();
        match handle {
            Some(handle) => handle.cancel().await,
            None => {
                tracing::debug!(session_id, "No running stream to cancel");
                false
            }
        }
    }

    /// Cancel every running stream, returning how many were cancelled
    pub async fn cancel_all(&self) -> usize {
        let handles: Vec<CancelHandle> = self.sessions.read().values().cloned().collect();
        let cancelled = futures::future::join_all(handles.iter().map(|handle| handle.cancel())).await;
        cancelled.into_iter().filter(|done| *done).count()
    }

    /// Ids of streams that have not settled yet, sorted
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, handle)| !handle.session().is_settled())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn list_schemas(&self, descriptor: &ConnectionDescriptor) -> Result<Vec<SchemaInfo>> {
        self.introspector.list_schemas(descriptor).await
    }

    pub async fn list_tables(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
    ) -> Result<Vec<TableInfo>> {
        self.introspector.list_tables(descriptor, schema).await
    }

    /// Columns of one table
    pub async fn get_table_details(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnDetail>> {
        self.introspector.get_columns(descriptor, schema, table).await
    }

    pub async fn get_table_metadata(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableMetadata> {
        self.introspector.get_table_metadata(descriptor, schema, table).await
    }

    pub async fn get_schema_map(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: &str,
    ) -> Result<SchemaMap> {
        self.introspector.get_schema_map(descriptor, schema).await
    }

    pub async fn list_enum_types(
        &self,
        descriptor: &ConnectionDescriptor,
        schema: Option<&str>,
    ) -> Result<Vec<EnumTypeInfo>> {
        self.introspector.list_enum_types(descriptor, schema).await
    }

    pub async fn get_db_stats(&self, descriptor: &ConnectionDescriptor) -> Result<DbStats> {
        self.introspector.get_db_stats(descriptor).await
    }

    pub fn invalidate_table_cache(&self, descriptor: &ConnectionDescriptor) -> bool {
        self.introspector.invalidate_table_cache(descriptor)
    }

    pub fn generate_create_table_migration(&self, params: &CreateTableParams) -> Result<Migration> {
        require_table(&params.table)?;
        let script = DdlSynthesizer::new(params.dialect).create_table_migration(
            params.schema.as_deref(),
            &params.table,
            &params.metadata,
        );
        Ok(Migration::from_script(params.migration_name(), &script))
    }

    pub fn generate_alter_table_migration(&self, params: &AlterTableParams) -> Result<Migration> {
        require_table(&params.table)?;
        let operations = params
            .operations
            .iter()
            .cloned()
            .map(AlterOperation::from_json)
            .collect::<MigrationResult<Vec<_>>>()
            .map_err(|e| BridgeError::from(e).context("Failed to parse alter table operations"))?;
        let script = DdlSynthesizer::new(params.dialect)
            .alter_table_migration(params.schema.as_deref(), &params.table, &operations)
            .map_err(|e| BridgeError::from(e).context("Failed to generate alter table migration"))?;
        Ok(Migration::from_script(params.migration_name(), &script))
    }

    pub fn generate_drop_table_migration(&self, params: &DropTableParams) -> Result<Migration> {
        require_table(&params.table)?;
        let script = DdlSynthesizer::new(params.dialect).drop_table_migration(
            params.schema.as_deref(),
            &params.table,
            params.mode,
        );
        Ok(Migration::from_script(params.migration_name(), &script))
    }

    /// Baseline for already introspected schemas
    pub fn generate_baseline_migration(
        &self,
        schemas: &[BaselineSchema],
        dialect: Dialect,
    ) -> BaselineMigration {
        let script = DdlSynthesizer::new(dialect).baseline_migration(schemas);
        tracing::info!(
            %dialect,
            schemas = schemas.len(),
            statements = script.up_sql.len(),
            "Generated baseline migration"
        );
        BaselineMigration {
            up_sql: script.up_script(),
            down_sql: script.down_script(),
        }
    }

    /// Introspect `schemas` and build their baseline.
    ///
    /// With no schemas given, the dialect's default schema is used, or the
    /// database itself on dialects without schemas.
    #[tracing::instrument(skip(self, descriptor), fields(dialect = %descriptor.dialect))]
    pub async fn generate_baseline_migration_from(
        &self,
        descriptor: &ConnectionDescriptor,
        schemas: &[String],
    ) -> Result<BaselineMigration> {
        let names: Vec<String> = if schemas.is_empty() {
            vec![
                descriptor
                    .dialect
                    .default_schema()
                    .map(str::to_string)
                    .unwrap_or_else(|| descriptor.database.clone()),
            ]
        } else {
            schemas.to_vec()
        };

        let mut baseline = Vec::with_capacity(names.len());
        for name in names {
            let tables = self.introspector.get_schema_map(descriptor, &name).await?;
            let enum_types = self
                .introspector
                .list_enum_types(descriptor, Some(&name))
                .await?;
            baseline.push(BaselineSchema::new(name, tables).with_enum_types(enum_types));
        }
        Ok(self.generate_baseline_migration(&baseline, descriptor.dialect))
    }

    /// Write `migration` into `dir`, or the configured migrations directory
    pub fn write_migration_file(&self, dir: Option<&Path>, migration: &Migration) -> Result<PathBuf> {
        let dir = self.migrations_dir(dir)?;
        sqlbridge_migrate::write_migration_file(&dir, migration)
            .map_err(|e| BridgeError::from(e).context("Failed to write migration file"))
    }

    pub fn list_migrations(&self, dir: Option<&Path>) -> Result<Vec<Migration>> {
        let dir = self.migrations_dir(dir)?;
        sqlbridge_migrate::list_migrations(&dir)
            .map_err(|e| BridgeError::from(e).context("Failed to list migrations"))
    }

    fn migrations_dir(&self, dir: Option<&Path>) -> Result<PathBuf> {
        dir.map(Path::to_path_buf)
            .or_else(|| self.config.migrations_dir.clone())
            .ok_or_else(|| {
                BridgeError::Configuration(
                    "no migrations directory given and none configured".to_string(),
                )
            })
    }
}

fn require_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(BridgeError::MigrationGeneration(
            "table name must not be empty".to_string(),
        ));
    }
    Ok(())
}
