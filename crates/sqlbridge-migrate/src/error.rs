//! Errors raised while synthesizing or persisting migrations

use sqlbridge_core::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// The operation tag names no known operation kind
    #[error("unknown operation kind: {0}")]
    UnknownOperation(String),

    /// The operation is well-formed JSON but cannot be turned into SQL
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("checksum mismatch for migration {version}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        version: String,
        expected: String,
        actual: String,
    },

    #[error("migration {0} has already been applied")]
    AlreadyApplied(String),

    #[error("invalid migration file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("migration file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type MigrationResult<T> = Result<T, MigrationError>;

impl From<MigrationError> for BridgeError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::UnknownOperation(_) | MigrationError::InvalidOperation(_) => {
                BridgeError::MigrationGeneration(err.to_string())
            }
            MigrationError::ChecksumMismatch { .. }
            | MigrationError::AlreadyApplied(_)
            | MigrationError::InvalidFile { .. } => BridgeError::MigrationApply(err.to_string()),
            MigrationError::Io(io) => BridgeError::Io(io),
        }
    }
}
