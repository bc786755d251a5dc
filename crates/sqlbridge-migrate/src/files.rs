//! On-disk migration files
//!
//! One file per migration, named `<version>_<name>.sql`, holding both
//! halves under `-- +migrate Up` / `-- +migrate Down` markers.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::{Migration, MigrationError, MigrationResult};

const UP_MARKER: &str = "-- +migrate Up";
const DOWN_MARKER: &str = "-- +migrate Down";

/// Write `migration` into `dir`, creating the directory if needed.
///
/// Never overwrites an existing file. The file name must be a single
/// `.sql` component so the file always lands inside `dir`.
pub fn write_migration_file(dir: &Path, migration: &Migration) -> MigrationResult<PathBuf> {
    let file_name = plain_file_name(dir, &migration.filename)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;
    write!(
        file,
        "{}\n{}\n\n{}\n{}\n",
        UP_MARKER,
        migration.up_sql.trim_end(),
        DOWN_MARKER,
        migration.down_sql.trim_end()
    )?;
    file.sync_all()?;
    tracing::info!(path = %path.display(), version = %migration.version, "Wrote migration file");
    Ok(path)
}

fn plain_file_name<'a>(dir: &Path, filename: &'a str) -> MigrationResult<&'a Path> {
    let candidate = Path::new(filename);
    let mut components = candidate.components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || candidate.extension().and_then(|e| e.to_str()) != Some("sql") {
        return Err(MigrationError::InvalidFile {
            path: dir.join(filename),
            reason: "file name must be a plain <version>_<name>.sql name".to_string(),
        });
    }
    Ok(candidate)
}

pub fn read_migration_file(path: &Path) -> MigrationResult<Migration> {
    let invalid = |reason: &str| MigrationError::InvalidFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid("file name is not valid UTF-8"))?;
    let (version, name) = stem
        .split_once('_')
        .filter(|(version, name)| {
            !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) && !name.is_empty()
        })
        .ok_or_else(|| invalid("expected a <version>_<name>.sql file name"))?;

    let content = fs::read_to_string(path)?;
    let up_start = content
        .find(UP_MARKER)
        .ok_or_else(|| invalid("missing '-- +migrate Up' section"))?;
    let down_start = content
        .find(DOWN_MARKER)
        .ok_or_else(|| invalid("missing '-- +migrate Down' section"))?;
    if down_start < up_start {
        return Err(invalid("the Down section precedes the Up section"));
    }

    let up_sql = content[up_start + UP_MARKER.len()..down_start].trim();
    let down_sql = content[down_start + DOWN_MARKER.len()..].trim();

    let mut migration = Migration::with_version(version, name, up_sql, down_sql);
    migration.filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or(migration.filename);
    Ok(migration)
}

/// Every `.sql` migration in `dir`, oldest first. A missing directory holds
/// no migrations.
pub fn list_migrations(dir: &Path) -> MigrationResult<Vec<Migration>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        migrations.push(read_migration_file(&path)?);
    }
    migrations.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    tracing::debug!(dir = %dir.display(), count = migrations.len(), "Listed migrations");
    Ok(migrations)
}

#[cfg(test)]
mod tests;
