use super::*;

#[test]
fn test_cache_key_uses_default_port() {
    let descriptor = ConnectionDescriptor::postgres("db.internal", "shop", "app");
    assert_eq!(descriptor.cache_key(), "db.internal:5432:shop");

    let descriptor = ConnectionDescriptor::mysql("db.internal", "shop", "app").with_port(3307);
    assert_eq!(descriptor.cache_key(), "db.internal:3307:shop");
}

#[test]
fn test_debug_redacts_password() {
    let descriptor =
        ConnectionDescriptor::postgres("localhost", "shop", "app").with_password("hunter2");
    let rendered = format!("{:?}", descriptor);
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("***"));
}

#[test]
fn test_validate_rejects_missing_fields() {
    assert!(ConnectionDescriptor::postgres("", "shop", "app").validate().is_err());
    assert!(ConnectionDescriptor::postgres("localhost", " ", "app").validate().is_err());
    assert!(
        ConnectionDescriptor::postgres("localhost", "shop", "app")
            .with_pool_size(0)
            .validate()
            .is_err()
    );
    assert!(ConnectionDescriptor::postgres("localhost", "shop", "app").validate().is_ok());
}

#[test]
fn test_deserialize_from_camel_case() {
    let json = r#"{
        "dialect": "mysql",
        "host": "127.0.0.1",
        "user": "root",
        "password": "secret",
        "database": "inventory",
        "tls": { "mode": "require" },
        "poolSize": 2
    }"#;
    let descriptor: ConnectionDescriptor = serde_json::from_str(json).unwrap();
    assert_eq!(descriptor.dialect, Dialect::MySql);
    assert_eq!(descriptor.effective_port(), 3306);
    assert_eq!(descriptor.tls.mode, TlsMode::Require);
    assert_eq!(descriptor.pool_size, Some(2));
}
