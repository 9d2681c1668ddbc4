//! # Database Error Types
//!
//! Error types for storage and transaction operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)         Domain rule (CoreError)            │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────── DbError::Domain                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kind() / code() ← what the external web layer renders                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use grocer_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation that a pre-check did not catch.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Another writer held the database past the busy timeout.
    ///
    /// Nothing was written. Safe for the caller to retry.
    #[error("Database is busy, retry the operation")]
    Busy,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// A domain rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Error category, shared with [`CoreError::kind`].
    ///
    /// Storage failures have no domain category and return `None`.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DbError::Domain(err) => Some(err.kind()),
            DbError::NotFound { .. } => Some(ErrorKind::NotFound),
            DbError::UniqueViolation { .. } | DbError::Busy => Some(ErrorKind::Conflict),
            _ => None,
        }
    }

    /// Stable machine-readable tag.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Domain(err) => err.code(),
            DbError::NotFound { .. } => "NOT_FOUND",
            DbError::UniqueViolation { .. } => "DUPLICATE_IDENTIFIER",
            DbError::ForeignKeyViolation { .. } => "FOREIGN_KEY_VIOLATION",
            DbError::ConnectionFailed(_) => "CONNECTION_FAILED",
            DbError::MigrationFailed(_) => "MIGRATION_FAILED",
            DbError::QueryFailed(_) => "QUERY_FAILED",
            DbError::TransactionFailed(_) => "TRANSACTION_FAILED",
            DbError::PoolExhausted => "POOL_EXHAUSTED",
            DbError::Busy => "BUSY",
            DbError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy | DbError::PoolExhausted)
    }

    /// Returns the domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<grocer_core::ValidationError> for DbError {
    fn from(err: grocer_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type / lock
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                //   "database is locked" / "database table is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("is locked") {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_keep_their_code() {
        let err: DbError = CoreError::EmptyCart.into();
        assert_eq!(err.code(), "EMPTY_CART");
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[test]
    fn test_busy_is_retryable_conflict() {
        assert!(DbError::Busy.is_retryable());
        assert_eq!(DbError::Busy.kind(), Some(ErrorKind::Conflict));
        assert!(!DbError::Internal("x".into()).is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }
}
