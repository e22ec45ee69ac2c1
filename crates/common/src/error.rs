use crate::operation::RowError;
use thiserror::Error;

/// Unified error type for Tundra crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot reach table store masters [{masters}]: {reason}")]
    ConnectionFailure { masters: String, reason: String },
    #[error("Table {0} does not exist")]
    TableNotFound(String),
    // Raised by the store when a concurrent creator won the race.
    #[error("Table {0} already exists")]
    TableAlreadyExists(String),
    #[error("{count} row mutation(s) rejected, first: {first}")]
    RowMutation { count: usize, first: String, errors: Vec<RowError> },
    #[error("Record could not be mapped to table operations: {0}")]
    TypeMismatch(String),
    #[error("Invalid range partition rule: {0}")]
    InvalidPartitionRule(String),
    #[error("Unsupported type {data_type} for column {column}")]
    UnsupportedColumnType { column: String, data_type: String },
    #[error("Literal for column {column} is not valid: {reason}")]
    InvalidLiteral { column: String, reason: String },
    #[error("Column {0} not found in table schema")]
    ColumnNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Table store error: {0}")]
    Store(String),
    #[error("Operation requires an open writer")]
    NotOpen,
    #[error("Operation on a closed resource")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn connection(masters: &[String], reason: impl Into<String>) -> Self {
        Error::ConnectionFailure { masters: masters.join(","), reason: reason.into() }
    }

    /// Wraps a batch of rejected operations. The batch must not be empty.
    pub fn row_mutation(errors: Vec<RowError>) -> Self {
        let first = errors.first().map(|e| e.to_string()).unwrap_or_default();
        Error::RowMutation { count: errors.len(), first, errors }
    }

    pub fn invalid_literal(column: &str, reason: impl Into<String>) -> Self {
        Error::InvalidLiteral { column: column.to_string(), reason: reason.into() }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }
}
