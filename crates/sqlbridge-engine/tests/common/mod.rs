//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use sqlbridge_core::{
    BackendId, BridgeError, CheckConstraintInfo, ColumnDetail, ColumnMeta, Connection,
    ConnectionDescriptor, DatabaseDriver, DbStats, Dialect, EnumTypeInfo, ForeignKeyInfo,
    IndexInfo, QueryResult, Result, Row, RowStream, SchemaInfo, SchemaIntrospection, SchemaMap,
    TableInfo, TableMetadata, TableType, UniqueConstraintInfo, Value,
};
use sqlbridge_drivers::DriverRegistry;
use sqlbridge_engine::{BatchSink, DataEngine, EngineConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const BACKEND_ID: i64 = 42;

/// Counters shared by a mock driver and every connection it opened
#[derive(Default)]
pub struct MockStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    produced: AtomicUsize,
    list_tables_calls: AtomicUsize,
    kills: Mutex<Vec<BackendId>>,
}

impl MockStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Rows the mock cursor has handed out so far
    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    pub fn list_tables_calls(&self) -> usize {
        self.list_tables_calls.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> Vec<BackendId> {
        self.kills.lock().clone()
    }
}

/// What the mock server does
#[derive(Clone, Default)]
pub struct MockScript {
    pub rows: usize,
    pub row_delay: Option<Duration>,
    /// Yield a driver error in place of this row
    pub fail_at_row: Option<usize>,
    pub fail_connect: bool,
    pub kill_delay: Option<Duration>,
    pub fail_kill: bool,
    /// Time `close` takes, as when the driver drains an unread result
    pub close_delay: Option<Duration>,
    pub tables: Vec<TableInfo>,
    pub metadata: SchemaMap,
    pub enum_types: Vec<EnumTypeInfo>,
}

/// Driver serving scripted rows and catalog data without a server
pub struct MockDriver {
    dialect: Dialect,
    script: MockScript,
    stats: Arc<MockStats>,
}

impl MockDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            script: MockScript::default(),
            stats: Arc::new(MockStats::default()),
        }
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.script.rows = rows;
        self
    }

    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.script.row_delay = Some(delay);
        self
    }

    pub fn failing_at_row(mut self, row: usize) -> Self {
        self.script.fail_at_row = Some(row);
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.script.fail_connect = true;
        self
    }

    pub fn with_kill_delay(mut self, delay: Duration) -> Self {
        self.script.kill_delay = Some(delay);
        self
    }

    pub fn with_failing_kill(mut self) -> Self {
        self.script.fail_kill = true;
        self
    }

    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.script.close_delay = Some(delay);
        self
    }

    pub fn with_table(mut self, schema: &str, name: &str, metadata: TableMetadata) -> Self {
        self.script.tables.push(table_info(schema, name, TableType::Table));
        self.script.metadata.insert(name.to_string(), metadata);
        self
    }

    pub fn with_view(mut self, schema: &str, name: &str) -> Self {
        self.script.tables.push(table_info(schema, name, TableType::View));
        self
    }

    pub fn with_enum(mut self, schema: &str, name: &str, labels: &[&str]) -> Self {
        for (i, label) in labels.iter().enumerate() {
            self.script.enum_types.push(EnumTypeInfo {
                schema: schema.to_string(),
                name: name.to_string(),
                value: label.to_string(),
                sort_order: (i + 1) as f64,
            });
        }
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn connect(&self, _descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Connection>> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_connect {
            return Err(BridgeError::connection_with(
                "mock server refused the connection",
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            ));
        }
        Ok(Arc::new(MockConnection {
            dialect: self.dialect,
            script: self.script.clone(),
            stats: Arc::clone(&self.stats),
            closed: AtomicBool::new(false),
        }))
    }

    async fn cancel_backend(&self, _descriptor: &ConnectionDescriptor, id: BackendId) -> Result<()> {
        self.stats.kills.lock().push(id);
        if let Some(delay) = self.script.kill_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.fail_kill {
            return Err(BridgeError::query("mock kill failed"));
        }
        Ok(())
    }
}

pub struct MockConnection {
    dialect: Dialect,
    script: MockScript,
    stats: Arc<MockStats>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, _sql: &str) -> Result<u64> {
        Ok(0)
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn backend_id(&self) -> Result<BackendId> {
        Ok(BackendId(BACKEND_ID))
    }

    async fn stream(&self, _sql: &str, _capacity: usize) -> Result<RowStream> {
        let columns: Arc<[ColumnMeta]> = Arc::from(vec![ColumnMeta::new("n", "int8", 0)]);
        let rows = self.script.rows;
        let delay = self.script.row_delay;
        let fail_at = self.script.fail_at_row;
        let stats = Arc::clone(&self.stats);

        let stream = futures::stream::unfold(0usize, move |i| {
            let columns = Arc::clone(&columns);
            let stats = Arc::clone(&stats);
            async move {
                if i >= rows {
                    return None;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fail_at == Some(i) {
                    let err = BridgeError::query_with(
                        "mock cursor failed",
                        std::io::Error::other("connection reset by peer"),
                    );
                    return Some((Err(err), rows));
                }
                stats.produced.fetch_add(1, Ordering::SeqCst);
                let row = Row::new(columns, vec![Value::Int64(i as i64)]);
                Some((Ok(row), i + 1))
            }
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<()> {
        if let Some(delay) = self.script.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

impl MockConnection {
    fn metadata(&self, table: &str) -> Result<&TableMetadata> {
        self.script
            .metadata
            .get(table)
            .ok_or_else(|| BridgeError::introspection(format!("no such table {}", table)))
    }
}

#[async_trait]
impl SchemaIntrospection for MockConnection {
    async fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        let names: BTreeSet<String> = self
            .script
            .tables
            .iter()
            .filter_map(|t| t.schema.clone())
            .collect();
        Ok(names.into_iter().map(|name| SchemaInfo { name }).collect())
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>> {
        self.stats.list_tables_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .tables
            .iter()
            .filter(|t| schema.is_none() || t.schema.as_deref() == schema)
            .cloned()
            .collect())
    }

    async fn get_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnDetail>> {
        Ok(self.metadata(table)?.columns.clone())
    }

    async fn get_primary_keys(&self, _schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        Ok(self.metadata(table)?.primary_keys.clone())
    }

    async fn get_foreign_keys(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>> {
        Ok(self.metadata(table)?.foreign_keys.clone())
    }

    async fn get_indexes(&self, _schema: Option<&str>, table: &str) -> Result<Vec<IndexInfo>> {
        Ok(self.metadata(table)?.indexes.clone())
    }

    async fn get_unique_constraints(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<UniqueConstraintInfo>> {
        Ok(self.metadata(table)?.unique_constraints.clone())
    }

    async fn get_check_constraints(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<CheckConstraintInfo>> {
        Ok(self.metadata(table)?.check_constraints.clone())
    }

    async fn list_enum_types(&self, schema: Option<&str>) -> Result<Vec<EnumTypeInfo>> {
        Ok(self
            .script
            .enum_types
            .iter()
            .filter(|e| schema.is_none_or(|s| e.schema == s))
            .cloned()
            .collect())
    }

    async fn get_db_stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            total_tables: self.script.metadata.len() as i64,
            total_rows: 1200,
            total_size_mb: 3.5,
        })
    }
}

fn table_info(schema: &str, name: &str, table_type: TableType) -> TableInfo {
    TableInfo {
        schema: Some(schema.to_string()),
        name: name.to_string(),
        table_type,
        row_count: None,
        size_bytes: None,
    }
}

pub fn descriptor(dialect: Dialect) -> ConnectionDescriptor {
    ConnectionDescriptor::new(dialect, "mock", "app", "app")
}

pub fn engine_with(driver: MockDriver, config: EngineConfig) -> DataEngine {
    let mut registry = DriverRegistry::new();
    registry.register(Arc::new(driver));
    DataEngine::with_registry(config, Arc::new(registry)).unwrap()
}

pub fn customers_and_orders() -> (TableMetadata, TableMetadata) {
    let customers = TableMetadata {
        columns: vec![ColumnDetail::new("id", "integer").primary_key()],
        primary_keys: vec!["id".to_string()],
        ..Default::default()
    };
    let orders = TableMetadata {
        columns: vec![
            ColumnDetail::new("id", "integer").primary_key(),
            ColumnDetail::new("customer_id", "integer").not_null(),
        ],
        primary_keys: vec!["id".to_string()],
        foreign_keys: vec![ForeignKeyInfo {
            constraint_name: "orders_customer_fk".to_string(),
            source_schema: "public".to_string(),
            source_table: "orders".to_string(),
            source_column: "customer_id".to_string(),
            target_schema: "public".to_string(),
            target_table: "customers".to_string(),
            target_column: "id".to_string(),
            ordinal_position: 1,
            delete_rule: Default::default(),
            update_rule: Default::default(),
        }],
        ..Default::default()
    };
    (customers, orders)
}

/// Batch sink that records what it was given
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<i64>>>,
    pub done: Mutex<Option<u64>>,
    /// `MockStats::produced` at the moment each batch arrived
    pub produced_at_batch: Mutex<Vec<usize>>,
    stats: Option<Arc<MockStats>>,
    delay: Option<Duration>,
    done_delay: Option<Duration>,
    fail_on_batch: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observing(mut self, stats: Arc<MockStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep in `on_done` after recording the total
    pub fn with_done_delay(mut self, delay: Duration) -> Self {
        self.done_delay = Some(delay);
        self
    }

    /// Fail when handed the batch with this 0-based index
    pub fn failing_on_batch(mut self, index: usize) -> Self {
        self.fail_on_batch = Some(index);
        self
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Vec::len).collect()
    }

    pub fn values(&self) -> Vec<i64> {
        self.batches.lock().iter().flatten().copied().collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn done(&self) -> Option<u64> {
        *self.done.lock()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn on_batch(&self, rows: Vec<Row>, columns: &[ColumnMeta]) -> Result<()> {
        assert_eq!(columns.len(), 1);
        if let Some(stats) = &self.stats {
            self.produced_at_batch.lock().push(stats.produced());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on_batch == Some(self.batch_count()) {
            return Err(BridgeError::Io(std::io::Error::other("consumer went away")));
        }
        let values = rows
            .iter()
            .map(|row| row.get(0).and_then(Value::as_i64).unwrap_or(-1))
            .collect();
        self.batches.lock().push(values);
        Ok(())
    }

    async fn on_done(&self, total_rows: u64) -> Result<()> {
        *self.done.lock() = Some(total_rows);
        if let Some(delay) = self.done_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
