//! Storage error type.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Database failures are sorted into connection, transaction, statement and
/// constraint errors so callers can react to the kind without inspecting
/// driver internals.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Transaction error: {0}")]
    Transaction(#[source] sqlx::Error),

    #[error("Statement error: {0}")]
    Statement(#[source] sqlx::Error),

    #[error("Query build error: {0}")]
    QueryBuild(#[from] sea_query::error::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid aggregate root version: {0}")]
    InvalidVersion(String),
}

impl StorageError {
    /// Classify a failure to begin or commit a transaction.
    ///
    /// Connection-class failures keep their kind; anything else is a
    /// transaction error.
    pub fn transaction(err: sqlx::Error) -> Self {
        match Self::from(err) {
            StorageError::Statement(e) => StorageError::Transaction(e),
            other => other,
        }
    }

    /// True for uniqueness and other storage-engine constraint failures.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StorageError::ConstraintViolation(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match err {
            sqlx::Error::Database(ref db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    StorageError::ConstraintViolation(db.message().to_string())
                }
                _ => StorageError::Statement(err),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StorageError::Connection(err),
            other => StorageError::Statement(other),
        }
    }
}
