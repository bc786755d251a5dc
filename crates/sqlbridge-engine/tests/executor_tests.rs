//! Streaming executor against a scripted driver

mod common;

use common::{BACKEND_ID, MockDriver, RecordingSink, descriptor, wait_until};
use pretty_assertions::assert_eq;
use sqlbridge_core::{BackendId, BridgeError, Dialect, ErrorKind};
use sqlbridge_engine::{ExecutorOptions, SessionState, StreamingExecutor};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

fn executor(driver: MockDriver, batch_size: usize) -> StreamingExecutor {
    StreamingExecutor::new(
        Arc::new(driver),
        ExecutorOptions::default().with_batch_size(batch_size),
    )
}

#[tokio::test]
async fn test_streams_rows_in_fixed_batches() {
    let driver = MockDriver::new(Dialect::Postgres).with_rows(2500);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 1000)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n FROM big", sink.clone())
        .unwrap();
    let summary = handle.completion().await.unwrap();

    assert_eq!(sink.batch_sizes(), vec![1000, 1000, 500]);
    assert_eq!(sink.values(), (0..2500).collect::<Vec<i64>>());
    assert_eq!(sink.done(), Some(2500));
    assert_eq!(summary.session_id, "s-1");
    assert_eq!(summary.total_rows, 2500);
    assert_eq!(summary.batches, 3);
    assert_eq!(stats.connects(), 1);
    assert_eq!(stats.closes(), 1);
    assert!(stats.kills().is_empty());
}

#[tokio::test]
async fn test_exact_multiple_has_no_short_batch() {
    let driver = MockDriver::new(Dialect::MySql).with_rows(2000);
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 1000)
        .start("s-1", descriptor(Dialect::MySql), "SELECT n FROM big", sink.clone())
        .unwrap();
    handle.completion().await.unwrap();

    assert_eq!(sink.batch_sizes(), vec![1000, 1000]);
    assert_eq!(sink.done(), Some(2000));
}

#[tokio::test]
async fn test_empty_result_still_completes() {
    let driver = MockDriver::new(Dialect::Postgres);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 100)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT 1 WHERE false", sink.clone())
        .unwrap();
    let summary = handle.completion().await.unwrap();

    assert_eq!(summary.total_rows, 0);
    assert_eq!(summary.batches, 0);
    assert_eq!(sink.batch_count(), 0);
    assert_eq!(sink.done(), Some(0));
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_next_row_waits_for_the_consumer() {
    let driver = MockDriver::new(Dialect::Postgres).with_rows(100);
    let sink = Arc::new(
        RecordingSink::new()
            .observing(driver.stats())
            .with_delay(Duration::from_millis(2)),
    );

    let handle = executor(driver, 10)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n FROM big", sink.clone())
        .unwrap();
    handle.completion().await.unwrap();

    let expected: Vec<usize> = (1..=10).map(|k| k * 10).collect();
    assert_eq!(*sink.produced_at_batch.lock(), expected);
}

#[tokio::test]
async fn test_cancel_mid_stream() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(10_000)
        .with_row_delay(Duration::from_millis(1));
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 50)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT pg_sleep(1), n", sink.clone())
        .unwrap();
    let session = Arc::clone(handle.session());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.cancel().await);
    let delivered_at_cancel = sink.batch_count();

    let err = handle.completion().await.unwrap_err();
    assert!(matches!(err, BridgeError::Cancelled));
    assert_eq!(sink.batch_count(), delivered_at_cancel);
    assert_eq!(sink.done(), None);
    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(session.rows_received() as usize, sink.values().len());
    assert_eq!(session.server_execution_id(), Some(BackendId(BACKEND_ID)));
    assert_eq!(stats.kills(), vec![BackendId(BACKEND_ID)]);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_cancel_is_a_no_op_once_settled() {
    let driver = MockDriver::new(Dialect::Postgres).with_rows(10);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 5)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    let canceller = handle.cancel_handle();
    handle.completion().await.unwrap();

    assert!(!canceller.cancel().await);
    assert!(stats.kills().is_empty());
    assert_eq!(canceller.session().state(), SessionState::Finished);
}

#[tokio::test]
async fn test_cancel_during_on_done_is_a_no_op() {
    let driver = MockDriver::new(Dialect::Postgres).with_rows(10);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new().with_done_delay(Duration::from_millis(200)));

    let handle = executor(driver, 5)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    let canceller = handle.cancel_handle();
    assert!(wait_until(|| sink.done().is_some()).await);

    assert!(!canceller.cancel().await);
    let summary = handle.completion().await.unwrap();
    assert_eq!(summary.total_rows, 10);
    assert!(stats.kills().is_empty());
    assert_eq!(canceller.session().state(), SessionState::Finished);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_second_cancel_returns_false() {
    let driver = MockDriver::new(Dialect::MySql)
        .with_rows(10_000)
        .with_row_delay(Duration::from_millis(1));
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 50)
        .start("s-1", descriptor(Dialect::MySql), "SELECT n", sink.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(handle.cancel().await);
    assert!(!handle.cancel().await);
    assert!(handle.completion().await.unwrap_err().is_cancelled());
    assert_eq!(stats.kills().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_kill_is_bounded_by_cancel_timeout() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(10_000)
        .with_row_delay(Duration::from_millis(10))
        .with_kill_delay(Duration::from_secs(60));
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());
    let options = ExecutorOptions::default()
        .with_batch_size(10)
        .with_cancel_timeout(Duration::from_millis(100));

    let handle = StreamingExecutor::new(Arc::new(driver), options)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = tokio::time::Instant::now();
    assert!(handle.cancel().await);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(handle.completion().await.unwrap_err().is_cancelled());
    assert_eq!(stats.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stream_settles_without_waiting_for_the_kill() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(10)
        .with_row_delay(Duration::from_secs(60))
        .with_kill_delay(Duration::from_secs(60));
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());
    let options = ExecutorOptions::default()
        .with_batch_size(10)
        .with_cancel_timeout(Duration::from_secs(30));

    let handle = StreamingExecutor::new(Arc::new(driver), options)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT pg_sleep(600)", sink.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let canceller = handle.cancel_handle();
    let cancel = tokio::spawn(async move { canceller.cancel().await });
    let started = tokio::time::Instant::now();
    assert!(handle.completion().await.unwrap_err().is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(cancel.await.unwrap());
    assert_eq!(stats.kills(), vec![BackendId(BACKEND_ID)]);
    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_close_does_not_hold_a_cancelled_stream() {
    let driver = MockDriver::new(Dialect::MySql)
        .with_rows(10_000)
        .with_row_delay(Duration::from_millis(10))
        .with_failing_kill()
        .with_close_delay(Duration::from_secs(60));
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());
    let options = ExecutorOptions::default()
        .with_batch_size(10)
        .with_cancel_timeout(Duration::from_millis(100));

    let handle = StreamingExecutor::new(Arc::new(driver), options)
        .start("s-1", descriptor(Dialect::MySql), "SELECT n", sink.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(handle.cancel().await);
    let started = tokio::time::Instant::now();
    assert!(handle.completion().await.unwrap_err().is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(stats.closes(), 0);

    // The close carries on in the background and still happens once
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_failed_kill_still_cancels_locally() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(10_000)
        .with_row_delay(Duration::from_millis(1))
        .with_failing_kill();
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 50)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(handle.cancel().await);
    assert!(handle.completion().await.unwrap_err().is_cancelled());
    assert_eq!(stats.kills().len(), 1);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_driver_failure_keeps_the_cause() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(1000)
        .failing_at_row(150);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 100)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    let session = Arc::clone(handle.session());
    let err = handle.completion().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert!(err.source().is_some());
    assert_eq!(sink.batch_sizes(), vec![100]);
    assert_eq!(sink.done(), None);
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_connect_failure_is_a_connection_error() {
    let driver = MockDriver::new(Dialect::MySql).failing_connect();
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let handle = executor(driver, 100)
        .start("s-1", descriptor(Dialect::MySql), "SELECT n", sink.clone())
        .unwrap();
    let err = handle.completion().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("Failed to open connection"), "{}", err);
    assert_eq!(stats.connects(), 1);
    assert_eq!(stats.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stream_timeout() {
    let driver = MockDriver::new(Dialect::Postgres)
        .with_rows(1000)
        .with_row_delay(Duration::from_millis(50));
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());
    let options = ExecutorOptions::default()
        .with_batch_size(100)
        .with_stream_timeout(Duration::from_millis(200));

    let handle = StreamingExecutor::new(Arc::new(driver), options)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    let err = handle.completion().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(sink.done(), None);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_consumer_failure_releases_the_connection() {
    let driver = MockDriver::new(Dialect::Postgres).with_rows(500);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new().failing_on_batch(1));

    let handle = executor(driver, 100)
        .start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink.clone())
        .unwrap();
    let err = handle.completion().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(sink.batch_sizes(), vec![100]);
    assert_eq!(sink.done(), None);
    assert_eq!(stats.closes(), 1);
}

#[tokio::test]
async fn test_rejects_zero_batch_size() {
    let driver = MockDriver::new(Dialect::Postgres).with_rows(10);
    let stats = driver.stats();
    let sink = Arc::new(RecordingSink::new());

    let result = executor(driver, 0).start("s-1", descriptor(Dialect::Postgres), "SELECT n", sink);

    assert!(matches!(result, Err(BridgeError::Configuration(_))));
    assert_eq!(stats.connects(), 0);
}
