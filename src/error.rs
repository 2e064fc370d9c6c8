//! Error types for schema management.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each error variant carries enough context for an operator to act on it from the
//! command line.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42704" for undefined object
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Migration drift: {message}")]
    Drift { message: String },

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SchemaError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error for a table, column, constraint or index.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a drift error (ledger or live schema disagrees with the catalog).
    pub fn drift(message: impl Into<String>) -> Self {
        Self::Drift {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Drift { .. } => Some("Run `notisync-migrate status` and compare with the catalog"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to SchemaError.
impl From<sqlx::Error> for SchemaError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => SchemaError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                SchemaError::database(
                    db_err.message(),
                    code,
                    "Check the migration SQL and the objects it references",
                )
            }
            sqlx::Error::RowNotFound => SchemaError::database(
                "No rows returned",
                None,
                "Verify the ledger table exists",
            ),
            // The configured limit is unknown here; see `db::pool::pool_error`.
            sqlx::Error::PoolTimedOut => SchemaError::timeout("connection pool acquire timed out"),
            sqlx::Error::PoolClosed => {
                SchemaError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => SchemaError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => SchemaError::connection(
                format!("TLS error: {}", tls_err),
                "Verify DB_SSL_MODE and the server certificates",
            ),
            sqlx::Error::Protocol(msg) => SchemaError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                SchemaError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => {
                SchemaError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                SchemaError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => SchemaError::internal("Database worker crashed"),
            _ => SchemaError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
