//! Error types for sqlbridge

use serde::Serialize;
use thiserror::Error;

/// Boxed driver error kept as the `source` of a wrapped failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for sqlbridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The server could not be reached or refused authentication
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The driver reported a failure while a query was running
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The stream was torn down because the user asked for it
    #[error("Query cancelled")]
    Cancelled,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Schema introspection error: {message}")]
    SchemaIntrospection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Migration generation error: {0}")]
    MigrationGeneration(String),

    #[error("Migration apply error: {0}")]
    MigrationApply(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable, machine-readable tag for an error, used on the event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    QueryExecution,
    Cancelled,
    Timeout,
    SchemaIntrospection,
    MigrationGeneration,
    MigrationApply,
    Configuration,
    NotSupported,
    Io,
    Serialization,
}

impl BridgeError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            source: None,
        }
    }

    pub fn query_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn introspection(message: impl Into<String>) -> Self {
        Self::SchemaIntrospection {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap any failure raised while reading the catalog.
    ///
    /// Connection and configuration failures keep their kind so the caller
    /// can still tell an unreachable server apart from a bad catalog query.
    pub fn into_introspection(self, operation: &str) -> Self {
        match self {
            err @ (Self::Connection { .. }
            | Self::SchemaIntrospection { .. }
            | Self::Configuration(_)
            | Self::NotSupported(_)
            | Self::Cancelled
            | Self::Timeout(_)) => err.context(operation),
            other => Self::SchemaIntrospection {
                message: format!("{operation}: {other}"),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Prefix the message with the name of the failing operation.
    ///
    /// The kind and the original source are preserved.
    pub fn context(self, operation: &str) -> Self {
        match self {
            Self::Connection { message, source } => Self::Connection {
                message: format!("{operation}: {message}"),
                source,
            },
            Self::QueryExecution { message, source } => Self::QueryExecution {
                message: format!("{operation}: {message}"),
                source,
            },
            Self::SchemaIntrospection { message, source } => Self::SchemaIntrospection {
                message: format!("{operation}: {message}"),
                source,
            },
            Self::Timeout(message) => Self::Timeout(format!("{operation}: {message}")),
            Self::MigrationGeneration(message) => {
                Self::MigrationGeneration(format!("{operation}: {message}"))
            }
            Self::MigrationApply(message) => {
                Self::MigrationApply(format!("{operation}: {message}"))
            }
            Self::Configuration(message) => {
                Self::Configuration(format!("{operation}: {message}"))
            }
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::QueryExecution { .. } => ErrorKind::QueryExecution,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::SchemaIntrospection { .. } => ErrorKind::SchemaIntrospection,
            Self::MigrationGeneration(_) => ErrorKind::MigrationGeneration,
            Self::MigrationApply(_) => ErrorKind::MigrationApply,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for sqlbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
