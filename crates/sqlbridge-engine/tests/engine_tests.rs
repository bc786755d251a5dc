//! DataEngine: introspection, table list caching and session tracking

mod common;

use common::{MockDriver, RecordingSink, customers_and_orders, descriptor, engine_with, wait_until};
use pretty_assertions::assert_eq;
use sqlbridge_core::{BridgeError, DbStats, Dialect, ErrorKind, TableMetadata};
use sqlbridge_engine::{ChannelEventSink, EngineConfig, EngineEvent};
use std::sync::Arc;
use std::time::Duration;

fn shop_driver(dialect: Dialect) -> MockDriver {
    let (customers, orders) = customers_and_orders();
    MockDriver::new(dialect)
        .with_table("public", "orders", orders)
        .with_table("public", "customers", customers)
        .with_view("public", "order_totals")
        .with_table("audit", "events", TableMetadata::default())
}

#[tokio::test]
async fn test_table_list_is_cached_per_database() {
    let driver = shop_driver(Dialect::Postgres);
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default());
    let db = descriptor(Dialect::Postgres);

    let first = engine.list_tables(&db, None).await.unwrap();
    let second = engine.list_tables(&db, None).await.unwrap();
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
    assert_eq!(stats.list_tables_calls(), 1);

    // A filtered request neither reads nor fills the cache
    let audit = engine.list_tables(&db, Some("audit")).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(stats.list_tables_calls(), 2);

    assert!(engine.invalidate_table_cache(&db));
    assert!(!engine.invalidate_table_cache(&db));
    engine.list_tables(&db, None).await.unwrap();
    assert_eq!(stats.list_tables_calls(), 3);

    assert_eq!(stats.connects(), stats.closes());
}

#[tokio::test]
async fn test_cache_is_keyed_by_host_port_and_database() {
    let driver = shop_driver(Dialect::Postgres);
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default());

    engine.list_tables(&descriptor(Dialect::Postgres), None).await.unwrap();
    engine
        .list_tables(&descriptor(Dialect::Postgres).with_port(6543), None)
        .await
        .unwrap();
    assert_eq!(stats.list_tables_calls(), 2);
    assert_eq!(engine.table_cache().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_table_list_expires() {
    let driver = shop_driver(Dialect::Postgres);
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default().with_table_cache_ttl_secs(60));
    let db = descriptor(Dialect::Postgres);

    engine.list_tables(&db, None).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    engine.list_tables(&db, None).await.unwrap();
    assert_eq!(stats.list_tables_calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    engine.list_tables(&db, None).await.unwrap();
    assert_eq!(stats.list_tables_calls(), 2);
}

#[tokio::test]
async fn test_introspection_reads() {
    let driver = shop_driver(Dialect::Postgres);
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default());
    let db = descriptor(Dialect::Postgres);

    let schemas: Vec<String> = engine
        .list_schemas(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(schemas, vec!["audit", "public"]);

    let columns = engine.get_table_details(&db, Some("public"), "orders").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "customer_id"]);

    let metadata = engine.get_table_metadata(&db, Some("public"), "orders").await.unwrap();
    assert_eq!(metadata.foreign_keys.len(), 1);

    let map = engine.get_schema_map(&db, "public").await.unwrap();
    let tables: Vec<&str> = map.keys().map(String::as_str).collect();
    assert_eq!(tables, vec!["orders", "customers"]);

    assert_eq!(
        engine.get_db_stats(&db).await.unwrap(),
        DbStats {
            total_tables: 3,
            total_rows: 1200,
            total_size_mb: 3.5,
        }
    );
    assert_eq!(stats.connects(), 5);
    assert_eq!(stats.closes(), 5);
}

#[tokio::test]
async fn test_introspection_errors_name_the_operation() {
    let driver = shop_driver(Dialect::Postgres);
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default());

    let err = engine
        .get_table_metadata(&descriptor(Dialect::Postgres), Some("public"), "missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaIntrospection);
    assert!(err.to_string().contains("Failed to read metadata of missing"), "{}", err);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_unreachable_server_stays_a_connection_error() {
    let engine = engine_with(
        MockDriver::new(Dialect::Postgres).failing_connect(),
        EngineConfig::default(),
    );
    let err = engine
        .list_tables(&descriptor(Dialect::Postgres), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("Failed to list tables"), "{}", err);
    assert!(engine.table_cache().is_empty());

    let tested = engine.test_connection(&descriptor(Dialect::Postgres)).await;
    assert!(!tested.ok);
}

#[tokio::test]
async fn test_enum_types_skip_dialects_without_them() {
    let driver = MockDriver::new(Dialect::MySql).with_enum("shop", "mood", &["sad", "happy"]);
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default());

    let enums = engine
        .list_enum_types(&descriptor(Dialect::MySql), None)
        .await
        .unwrap();
    assert!(enums.is_empty());
    assert_eq!(stats.connects(), 0);
}

#[tokio::test]
async fn test_baseline_from_live_schema() {
    let driver = shop_driver(Dialect::Postgres).with_enum("public", "mood", &["sad", "happy"]);
    let engine = engine_with(driver, EngineConfig::default());

    let baseline = engine
        .generate_baseline_migration_from(&descriptor(Dialect::Postgres), &[])
        .await
        .unwrap();

    let enum_at = baseline.up_sql.find(r#"CREATE TYPE "public"."mood" AS ENUM ('sad', 'happy');"#);
    let customers_at = baseline.up_sql.find(r#"CREATE TABLE "public"."customers""#);
    let orders_at = baseline.up_sql.find(r#"CREATE TABLE "public"."orders""#);
    assert!(enum_at.is_some() && customers_at.is_some() && orders_at.is_some(), "{}", baseline.up_sql);
    assert!(enum_at < customers_at);
    assert!(customers_at < orders_at);
    assert!(!baseline.up_sql.contains("order_totals"));

    assert_eq!(
        baseline.down_sql,
        [
            r#"DROP TABLE "public"."orders" CASCADE;"#,
            r#"DROP TABLE "public"."customers" CASCADE;"#,
            r#"DROP TYPE "public"."mood" CASCADE;"#,
        ]
        .join("\n\n")
    );
}

#[tokio::test]
async fn test_sessions_are_tracked_until_settled() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(10_000)
        .with_row_delay(Duration::from_millis(1));
    let stats = driver.stats();
    let engine = engine_with(driver, EngineConfig::default());
    let sink = Arc::new(RecordingSink::new());

    let handle = engine
        .stream_query("grid-1", descriptor(Dialect::Postgres), "SELECT n", Some(100), sink.clone())
        .unwrap();
    assert_eq!(engine.active_sessions(), vec!["grid-1"]);

    let duplicate = engine.stream_query("grid-1", descriptor(Dialect::Postgres), "SELECT n", None, sink.clone());
    assert!(matches!(duplicate, Err(BridgeError::Configuration(_))));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(engine.cancel_query("grid-1").await);
    assert!(handle.completion().await.unwrap_err().is_cancelled());
    assert!(wait_until(|| engine.active_sessions().is_empty()).await);
    assert!(!engine.cancel_query("grid-1").await);
    assert_eq!(stats.closes(), 1);

    // The id is free again once the first stream settled
    let rerun = engine
        .stream_query("grid-1", descriptor(Dialect::Postgres), "SELECT n", Some(100), sink.clone())
        .unwrap();
    assert_eq!(engine.cancel_all().await, 1);
    assert!(rerun.completion().await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_stream_to_events() {
    let engine = engine_with(MockDriver::new(Dialect::Postgres).with_rows(250), EngineConfig::default());
    let (events, mut rx) = ChannelEventSink::channel(16);

    let completion = engine
        .stream_to_events("s-1", descriptor(Dialect::Postgres), "SELECT n", Some(100), Arc::new(events))
        .unwrap();
    let summary = completion.await.unwrap().unwrap();
    assert_eq!(summary.total_rows, 250);

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }

    let progress: Vec<u64> = received
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Progress { rows_received, .. } => Some(*rows_received),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![100, 200, 250]);

    let kinds: Vec<&str> = received
        .iter()
        .map(|e| match e {
            EngineEvent::Batch { .. } => "batch",
            EngineEvent::Progress { .. } => "progress",
            EngineEvent::Done { .. } => "done",
            EngineEvent::Error { .. } => "error",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["batch", "progress", "batch", "progress", "batch", "progress", "done"]
    );
    assert!(received.iter().all(|e| e.session_id() == "s-1"));
}

#[tokio::test]
async fn test_cancelled_stream_reports_an_error_event() {
    let engine = engine_with(
        MockDriver::new(Dialect::Postgres)
            .with_rows(10_000)
            .with_row_delay(Duration::from_millis(1)),
        EngineConfig::default(),
    );
    let (events, mut rx) = ChannelEventSink::channel(1024);

    let completion = engine
        .stream_to_events("s-9", descriptor(Dialect::Postgres), "SELECT n", Some(10), Arc::new(events))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(engine.cancel_query("s-9").await);
    assert!(completion.await.unwrap().unwrap_err().is_cancelled());

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(EngineEvent::Error {
            session_id: "s-9".to_string(),
            kind: ErrorKind::Cancelled,
            message: "Query cancelled".to_string(),
        })
    );
}
