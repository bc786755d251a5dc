use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sqlbridge_core::ErrorKind;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.stream_timeout(), Duration::from_secs(300));
    assert_eq!(config.cancel_timeout(), Duration::from_secs(5));
    assert_eq!(config.table_cache_ttl(), Duration::from_secs(60));
    assert_eq!(config.default_batch_size, 1000);
    assert_eq!(config.migrations_dir, None);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = EngineConfig::from_toml_str(indoc! {r#"
        default_batch_size = 250
        migrations_dir = "db/migrations"
    "#})
    .unwrap();
    assert_eq!(
        config,
        EngineConfig::default()
            .with_default_batch_size(250)
            .with_migrations_dir("db/migrations")
    );
}

#[test]
fn test_empty_toml_is_default() {
    assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
}

#[test]
fn test_rejects_zero_batch_size_and_bad_types() {
    let err = EngineConfig::from_toml_str("default_batch_size = 0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = EngineConfig::from_toml_str("stream_timeout_secs = \"soon\"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "stream_timeout_secs = 30\ncancel_timeout_secs = 2\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.stream_timeout(), Duration::from_secs(30));
    assert_eq!(config.cancel_timeout(), Duration::from_secs(2));

    let missing = EngineConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Io);
}
