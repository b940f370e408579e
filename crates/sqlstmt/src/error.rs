//! Error types for sqlstmt

use std::fmt;
use thiserror::Error;

/// Result type alias for sqlstmt operations
pub type DbResult<T> = Result<T, DbError>;

/// Where in the driver a failure was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Connecting, or the connection went away.
    Connection,
    /// Preparing, binding or executing a statement.
    Execute,
    /// BEGIN / COMMIT / ROLLBACK.
    Transaction,
    /// Reading a column value out of a result row.
    Decode,
}

/// A failure reported by a [`Driver`](crate::Driver).
///
/// `code` carries the database's own error code (SQLSTATE for Postgres and
/// MySQL) when one is available; the transaction runner classifies on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}{}: {message}", code_suffix(.code))]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    /// Create a driver error without a database code.
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Create an execution error.
    pub fn execute(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Execute, message)
    }

    /// Create a transaction-control error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Transaction, message)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Connection, message)
    }

    /// Create a decode error for a specific column.
    pub fn decode(column: &str, message: impl fmt::Display) -> Self {
        Self::new(
            DriverErrorKind::Decode,
            format!("column '{column}': {message}"),
        )
    }

    /// Attach the database error code (e.g. SQLSTATE `40001`).
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Override the error kind.
    pub fn with_kind(mut self, kind: DriverErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

/// Error types for statement building, execution and caching
#[derive(Debug, Error)]
pub enum DbError {
    /// A mutator was called after the statement was rendered.
    #[error("The {statement} statement can no longer be modified")]
    Frozen { statement: &'static str },

    /// Programming error in how the API was used
    #[error("Usage error: {0}")]
    Usage(String),

    /// Failure reported by the database driver
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Failure reported by the cache backend
    #[error("Cache error: {0}")]
    Cache(String),

    /// Encoding or decoding a cached result or a mapped row
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    /// Check if this error comes from mutating a frozen statement
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen { .. })
    }

    /// Check if this error was reported by the driver
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// The database error code, if the driver reported one
    pub fn driver_code(&self) -> Option<&str> {
        match self {
            Self::Driver(err) => err.code.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
