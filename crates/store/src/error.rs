use thiserror::Error;

/// Errors from the SQLite storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the database or the connection pool failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A query or DDL statement failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Map a query-level `sqlx` error into [`StoreError::Backend`].
pub(crate) fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}
