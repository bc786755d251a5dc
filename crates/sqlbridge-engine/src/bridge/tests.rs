use super::*;
use crate::config::EngineConfig;
use pretty_assertions::assert_eq;
use sqlbridge_drivers::DriverRegistry;
use tokio::io::AsyncReadExt;

async fn run(engine: DataEngine, input: &str) -> Vec<Value> {
    let (output, mut reader) = tokio::io::duplex(64 * 1024);
    let input = std::io::Cursor::new(input.as_bytes().to_vec());
    let (served, written) = tokio::join!(serve(Arc::new(engine), input, output), async move {
        let mut buf = String::new();
        reader.read_to_string(&mut buf).await.unwrap();
        buf
    });
    served.unwrap();
    written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn engine(config: EngineConfig) -> DataEngine {
    DataEngine::with_registry(config, Arc::new(DriverRegistry::new())).unwrap()
}

fn response<'a>(messages: &'a [Value], id: i64) -> &'a Value {
    messages
        .iter()
        .find(|m| m["id"] == json!(id))
        .unwrap_or_else(|| panic!("no response for request {}", id))
}

#[tokio::test]
async fn test_generates_migrations() {
    let input = [
        json!({"id": 1, "method": "generateAlterTableMigration", "params": {
            "table": "t",
            "operations": [{"type": "SET_NOT_NULL", "column": "c"}],
        }}),
        json!({"id": 2, "method": "generateDropTableMigration", "params": {
            "dialect": "postgres", "schema": "public", "table": "orders", "mode": "cascade",
        }}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n");

    let messages = run(engine(EngineConfig::default()), &input).await;
    assert_eq!(messages.len(), 2);

    let alter = &response(&messages, 1)["result"];
    assert_eq!(alter["name"], json!("alter_t"));
    assert_eq!(alter["upSQL"], json!(r#"ALTER TABLE "t" ALTER COLUMN "c" SET NOT NULL;"#));
    assert_eq!(alter["downSQL"], json!(r#"ALTER TABLE "t" ALTER COLUMN "c" DROP NOT NULL;"#));

    let drop = &response(&messages, 2)["result"];
    assert_eq!(drop["upSQL"], json!(r#"DROP TABLE "public"."orders" CASCADE;"#));
}

#[tokio::test]
async fn test_errors_carry_kind_and_id() {
    let input = concat!(
        r#"{"id": 1, "method": "dropDatabase"}"#,
        "\n",
        "not json\n",
        "\n",
        r#"{"id": 2, "method": "generateAlterTableMigration", "params": {"table": "t", "operations": [{"type": "RENAME_TABLE"}]}}"#,
        "\n",
        r#"{"id": 3, "method": "listTables", "params": {}}"#,
        "\n",
    );

    let messages = run(engine(EngineConfig::default()), input).await;
    assert_eq!(messages.len(), 4);

    assert_eq!(response(&messages, 1)["error"]["kind"], json!("not_supported"));
    assert_eq!(response(&messages, 2)["error"]["kind"], json!("migration_generation"));
    // Missing descriptor
    assert_eq!(response(&messages, 3)["error"]["kind"], json!("serialization"));

    let malformed = messages
        .iter()
        .find(|m| m["id"].is_null())
        .unwrap();
    assert_eq!(malformed["error"]["kind"], json!("serialization"));
}

#[tokio::test]
async fn test_write_and_list_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_migrations_dir(dir.path());
    let migration = Migration::with_version("20240102030405", "add users", "CREATE TABLE u (id int);", "DROP TABLE u;");
    let write = json!({"id": 1, "method": "writeMigrationFile", "params": {"migration": migration}});

    let messages = run(engine(config.clone()), &write.to_string()).await;
    let path = dir.path().join("20240102030405_add_users.sql");
    assert_eq!(messages[0]["result"]["path"], json!(path));
    assert!(path.exists());

    let messages = run(engine(config), r#"{"id": 7, "method": "listMigrations"}"#).await;
    let listed = messages[0]["result"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["version"], json!("20240102030405"));
    assert_eq!(listed[0]["upSQL"], json!("CREATE TABLE u (id int);"));
}

#[tokio::test]
async fn test_cancel_unknown_session() {
    let messages = run(
        engine(EngineConfig::default()),
        r#"{"id": "a", "method": "cancelQuery", "params": {"sessionId": "nope"}}"#,
    )
    .await;
    assert_eq!(messages, vec![json!({"id": "a", "result": {"cancelled": false}})]);
}

#[tokio::test]
async fn test_empty_input_shuts_down_cleanly() {
    let messages = run(engine(EngineConfig::default()), "").await;
    assert!(messages.is_empty());
}
