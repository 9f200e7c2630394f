//! Error types for pgvac core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for pgvac operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for pgvac.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inventory error
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Notification error
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inventory-specific errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file could not be read
    #[error("Failed to read inventory {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// A malformed inventory record.
///
/// Line errors are recovered by the reader; they only surface as values in
/// [`crate::inventory::Inventory::errors`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryLineError {
    /// Wrong number of comma-separated fields
    #[error("line {line}: expected 5 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    /// Port is not a positive integer
    #[error("line {line}: invalid port '{value}'")]
    InvalidPort { line: usize, value: String },

    /// A required field is empty
    #[error("line {line}: empty {field}")]
    EmptyField { line: usize, field: &'static str },

    /// The record is not valid UTF-8
    #[error("line {line}: not valid UTF-8")]
    Encoding { line: usize },
}

impl InventoryLineError {
    /// 1-based line number of the offending record.
    pub fn line(&self) -> usize {
        match self {
            Self::FieldCount { line, .. }
            | Self::InvalidPort { line, .. }
            | Self::EmptyField { line, .. }
            | Self::Encoding { line } => *line,
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open a connection
    #[error("Connection failed to {target}: {message}")]
    ConnectionFailed { target: String, message: String },

    /// A query against the control connection failed
    #[error("Query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// No statistics row exists for the table
    #[error("No statistics for {0}")]
    StatsNotFound(String),

    /// The maintenance operation itself failed
    #[error("Maintenance of {table} failed: {message}")]
    Execution { table: String, message: String },

    /// Registry write transaction failed
    #[error("Registry update for {table} failed: {message}")]
    RegistryWrite { table: String, message: String },
}

impl DatabaseError {
    /// Build a query error from any displayable source.
    pub fn query(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Query {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

/// Notification-specific errors.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Sender or recipient address is invalid
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// Message could not be built
    #[error("Message build failed: {0}")]
    Build(String),

    /// Transport rejected or failed to deliver the message
    #[error("Transport error: {0}")]
    Transport(String),
}

// Conversion implementations for external error types

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("invalid value".into());
        assert_eq!(err.to_string(), "Configuration error: invalid value");

        let db_err = DatabaseError::ConnectionFailed {
            target: "db1:5432/app".into(),
            message: "connection refused".into(),
        };
        let err: Error = db_err.into();
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_inventory_line_error() {
        let err = InventoryLineError::FieldCount { line: 3, found: 4 };
        assert_eq!(err.to_string(), "line 3: expected 5 fields, found 4");
        assert_eq!(err.line(), 3);

        let err = InventoryLineError::Encoding { line: 7 };
        assert_eq!(err.to_string(), "line 7: not valid UTF-8");
        assert_eq!(err.line(), 7);
    }

    #[test]
    fn test_inventory_error_display() {
        let err: Error = InventoryError::Unreadable {
            path: "db_inventory.csv".into(),
            message: "No such file or directory".into(),
        }
        .into();
        assert!(err
            .to_string()
            .starts_with("Inventory error: Failed to read inventory db_inventory.csv"));
    }

    #[test]
    fn test_query_helper() {
        let err = DatabaseError::query("lock check", "relation does not exist");
        assert_eq!(
            err.to_string(),
            "Query failed (lock check): relation does not exist"
        );
    }
}
