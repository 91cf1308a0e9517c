use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

/// Errors surfaced by the access layer.
///
/// Statement failures carry the statement text and the parameter *names* —
/// never the parameter values, which may be sensitive. The text itself can be
/// withheld too via
/// [`Database::with_statement_redaction`](crate::Database::with_statement_redaction).
#[derive(Debug, Error)]
pub enum DbError {
    /// A parameter value outside the supported set; raised before any I/O.
    #[error("{type_name} is not serializable")]
    UnserializableValue { type_name: String },

    /// A statement failed to bind or execute. Rollback has already been
    /// attempted by the time this reaches the caller.
    #[error("query failed: {source}; statement: {statement}; params: [{}]", param_names.join(", "))]
    QueryError {
        statement: String,
        param_names: Vec<String>,
        #[source]
        source: DriverError,
    },

    /// No connection became available within the acquire timeout.
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Malformed `/* @name ... */` header in a query file.
    #[error("'{0}' is not a valid query header")]
    InvalidQueryHeader(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    /// A background task died before producing a result.
    #[error("background task failed: {0}")]
    Background(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The failure underneath a [`DbError::QueryError`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Placeholder/parameter mismatch caught before execution.
    #[error("{0}")]
    Bind(String),
}
