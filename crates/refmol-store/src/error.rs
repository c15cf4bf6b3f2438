//! Error types for the refmol-store crate.
//!
//! Wraps `sqlx` errors with additional context so callers can tell
//! connection problems apart from query problems.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to establish or acquire a database connection.
    #[error("database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// A transaction operation was issued in the wrong state.
    ///
    /// Raised when `begin_transaction` is called while a transaction is
    /// already open, or `commit`/`rollback` without one.
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, StoreError::ConnectionFailed(_))
    }

    /// Check if this error indicates a query problem.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, StoreError::QueryFailed(_))
    }

    /// Check if this error indicates a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
