use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn migration(version: &str, name: &str) -> Migration {
    Migration::with_version(
        version,
        name,
        "CREATE TABLE \"users\" (\n  \"id\" integer NOT NULL,\n  PRIMARY KEY (\"id\")\n);",
        "DROP TABLE \"users\";",
    )
}

#[test]
fn test_write_creates_directory_and_file() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("db").join("migrations");

    let path = write_migration_file(&dir, &migration("20240101120000", "CreateUsers")).unwrap();
    assert_eq!(path, dir.join("20240101120000_create_users.sql"));

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        indoc! {r#"
            -- +migrate Up
            CREATE TABLE "users" (
              "id" integer NOT NULL,
              PRIMARY KEY ("id")
            );

            -- +migrate Down
            DROP TABLE "users";
        "#}
    );
}

#[test]
fn test_write_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let original = migration("20240101120000", "create_users");
    write_migration_file(temp.path(), &original).unwrap();

    let err = write_migration_file(temp.path(), &original).unwrap_err();
    assert!(matches!(err, MigrationError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists));
}

#[test]
fn test_read_returns_what_was_written() {
    let temp = TempDir::new().unwrap();
    let original = migration("20240101120000", "create_users");
    let path = write_migration_file(temp.path(), &original).unwrap();

    let read = read_migration_file(&path).unwrap();
    assert_eq!(read.version, "20240101120000");
    assert_eq!(read.name, "create_users");
    assert_eq!(read.filename, "20240101120000_create_users.sql");
    assert_eq!(read.up_sql, original.up_sql);
    assert_eq!(read.down_sql, original.down_sql);
    assert_eq!(read.checksum(), original.checksum());
}

#[test]
fn test_read_rejects_bad_names_and_sections() {
    let temp = TempDir::new().unwrap();

    let unversioned = temp.path().join("create_users.sql");
    fs::write(&unversioned, "-- +migrate Up\nSELECT 1;\n-- +migrate Down\nSELECT 1;\n").unwrap();
    assert!(matches!(
        read_migration_file(&unversioned),
        Err(MigrationError::InvalidFile { .. })
    ));

    let no_down = temp.path().join("20240101120000_no_down.sql");
    fs::write(&no_down, "-- +migrate Up\nSELECT 1;\n").unwrap();
    let err = read_migration_file(&no_down).unwrap_err();
    assert!(err.to_string().contains("Down"), "{err}");

    let swapped = temp.path().join("20240101120000_swapped.sql");
    fs::write(&swapped, "-- +migrate Down\nSELECT 1;\n-- +migrate Up\nSELECT 2;\n").unwrap();
    assert!(matches!(
        read_migration_file(&swapped),
        Err(MigrationError::InvalidFile { .. })
    ));
}

#[test]
fn test_list_sorts_by_version_and_skips_other_files() {
    let temp = TempDir::new().unwrap();
    write_migration_file(temp.path(), &migration("20240301000000", "third")).unwrap();
    write_migration_file(temp.path(), &migration("20240101000000", "first")).unwrap();
    write_migration_file(temp.path(), &migration("20240201000000", "second")).unwrap();
    fs::write(temp.path().join("README.md"), "notes").unwrap();
    fs::create_dir(temp.path().join("archive.sql")).unwrap();

    let names: Vec<String> = list_migrations(temp.path())
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["first", "second", "third"]);
}

#[test]
fn test_list_missing_directory_is_empty() {
    let temp = TempDir::new().unwrap();
    let migrations = list_migrations(&temp.path().join("nope")).unwrap();
    assert!(migrations.is_empty());
}

#[test]
fn test_write_keeps_file_inside_directory() {
    let parent = TempDir::new().unwrap();
    let dir = parent.path().join("migrations");
    let outside = TempDir::new().unwrap();

    let mut absolute = migration("20240101120000", "create_users");
    absolute.filename = outside.path().join("escaped.sql").display().to_string();
    let err = write_migration_file(&dir, &absolute).unwrap_err();
    assert!(matches!(err, MigrationError::InvalidFile { .. }));
    assert!(!outside.path().join("escaped.sql").exists());

    let mut parent_relative = migration("20240101120000", "create_users");
    parent_relative.filename = "../escaped.sql".to_string();
    let err = write_migration_file(&dir, &parent_relative).unwrap_err();
    assert!(matches!(err, MigrationError::InvalidFile { .. }));
    assert!(!parent.path().join("escaped.sql").exists());

    for filename in ["nested/20240101120000_x.sql", "20240101120000_x.txt", ""] {
        let mut bad = migration("20240101120000", "x");
        bad.filename = filename.to_string();
        assert!(
            matches!(write_migration_file(&dir, &bad), Err(MigrationError::InvalidFile { .. })),
            "{filename:?} should be rejected"
        );
    }
    assert!(!dir.exists());
}
