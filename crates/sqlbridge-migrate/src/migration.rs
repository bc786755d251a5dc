//! Versioned up/down migration records

use chrono::Local;
use ring::digest;
use serde::{Deserialize, Serialize};

use crate::{DdlScript, MigrationError, MigrationResult};

const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// A migration ready to be written to disk.
///
/// `version` is a wall-clock timestamp, so lexical and chronological order
/// agree. Two migrations created within the same second share a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub version: String,
    pub name: String,
    pub filename: String,
    #[serde(rename = "upSQL")]
    pub up_sql: String,
    #[serde(rename = "downSQL")]
    pub down_sql: String,
}

impl Migration {
    /// Stamp a new migration with the current local time
    pub fn new(name: impl Into<String>, up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        let version = Local::now().format(VERSION_FORMAT).to_string();
        Self::with_version(version, name, up_sql, down_sql)
    }

    pub fn with_version(
        version: impl Into<String>,
        name: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        let version = version.into();
        let name = name.into();
        let filename = format!("{}_{}.sql", version, sanitize_name(&name));
        Self {
            version,
            name,
            filename,
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    pub fn from_script(name: impl Into<String>, script: &DdlScript) -> Self {
        Self::new(name, script.up_script(), script.down_script())
    }

    /// SHA-256 of the up and down SQL, hex encoded
    pub fn checksum(&self) -> String {
        let mut context = digest::Context::new(&digest::SHA256);
        context.update(self.up_sql.as_bytes());
        context.update(&[0]);
        context.update(self.down_sql.as_bytes());
        hex::encode(context.finish().as_ref())
    }

    /// Fails when the content changed since `expected` was recorded
    pub fn verify_checksum(&self, expected: &str) -> MigrationResult<()> {
        let actual = self.checksum();
        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(MigrationError::ChecksumMismatch {
                version: self.version.clone(),
                expected: expected.trim().to_string(),
                actual,
            })
        }
    }

    pub fn ensure_not_applied<S: AsRef<str>>(&self, applied_versions: &[S]) -> MigrationResult<()> {
        if applied_versions.iter().any(|v| v.as_ref() == self.version) {
            return Err(MigrationError::AlreadyApplied(self.version.clone()));
        }
        Ok(())
    }
}

/// Lowercase snake_case form of a migration name for use in filenames.
///
/// `AddUserEmail` and `add user-email` both become `add_user_email`.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            let after_lower = previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            if ch.is_ascii_uppercase() && after_lower {
                sanitized.push('_');
            }
            sanitized.push(ch.to_ascii_lowercase());
        } else if !sanitized.ends_with('_') {
            sanitized.push('_');
        }
        previous = Some(ch);
    }

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "migration".to_string()
    } else {
        trimmed.to_string()
    }
}
