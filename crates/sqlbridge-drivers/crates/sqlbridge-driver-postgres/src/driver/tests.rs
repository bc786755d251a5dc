use super::*;
use sqlbridge_core::TlsMode;

#[test]
fn test_driver_identity() {
    let driver = PostgresDriver::new();
    assert_eq!(driver.dialect(), Dialect::Postgres);
    assert_eq!(driver.name(), "PostgreSQL");
}

#[test]
fn test_connection_string_omits_password() {
    let descriptor = ConnectionDescriptor::postgres("db.internal", "shop", "app")
        .with_password("hunter2")
        .with_port(6543);
    let url = PostgresDriver::default().build_connection_string(&descriptor);
    assert_eq!(url, "postgres://app@db.internal:6543/shop");
    assert!(!url.contains("hunter2"));
}

#[tokio::test]
async fn test_connect_rejects_invalid_descriptor_before_dialing() {
    let descriptor = ConnectionDescriptor::postgres("", "shop", "app").with_tls_mode(TlsMode::Disable);
    let err = PostgresDriver::new().connect(&descriptor).await.err().unwrap();
    assert_eq!(err.kind(), sqlbridge_core::ErrorKind::Configuration);
}
