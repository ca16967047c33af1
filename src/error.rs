//! Error types for the PostgreSQL schema MCP server.
//!
//! All fallible operations return [`DbResult`]. The MCP facade renders any
//! [`DbError`] as an `Error: <message>` text payload, so the `Display` output
//! of each variant is what a client ultimately reads.

use thiserror::Error;

/// SQLSTATE raised by PostgreSQL when a read-only transaction attempts a write.
pub const READ_ONLY_SQL_TRANSACTION: &str = "25006";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    /// A result column whose PostgreSQL type has no JSON mapping.
    #[error("Unsupported column type {type_name} for column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    pub fn unsupported_type(column: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            type_name: type_name.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// SQLSTATE code reported by the server, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// True when the server rejected a write inside a read-only transaction.
    pub fn is_read_only_violation(&self) -> bool {
        self.sql_state() == Some(READ_ONLY_SQL_TRANSACTION)
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("Protocol error: {}", msg)),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::internal(format!("JSON serialization failed: {}", err))
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect");
        assert_eq!(err.to_string(), "Connection failed: Failed to connect");
    }

    #[test]
    fn test_sql_state_only_on_database_errors() {
        let err = DbError::database("Syntax error", Some("42601".to_string()));
        assert_eq!(err.sql_state(), Some("42601"));
        assert_eq!(DbError::internal("boom").sql_state(), None);
    }

    #[test]
    fn test_unsupported_type_names_column_and_type() {
        let err = DbError::unsupported_type("pair", "RECORD");
        assert_eq!(err.to_string(), "Unsupported column type RECORD for column 'pair'");
    }

    #[test]
    fn test_read_only_violation_detection() {
        let err = DbError::database(
            "cannot execute INSERT in a read-only transaction",
            Some(READ_ONLY_SQL_TRANSACTION.to_string()),
        );
        assert!(err.is_read_only_violation());

        let err = DbError::database("syntax error", Some("42601".to_string()));
        assert!(!err.is_read_only_violation());
        assert!(!DbError::timeout("query", 5).is_read_only_violation());
    }

    #[test]
    fn test_configuration_error_display() {
        let err = DbError::configuration("missing database URL");
        assert_eq!(err.to_string(), "Configuration error: missing database URL");
    }

    #[test]
    fn test_io_error_maps_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DbError = sqlx::Error::Io(io).into();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_timeout_display() {
        let err = DbError::timeout("query", 30);
        assert_eq!(err.to_string(), "Timeout: query exceeded 30s");
    }
}
