use thiserror::Error;

/// Errors raised by the user store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No user with this id
    #[error("user {0} not found")]
    NotFound(i64),

    /// A user with this id already exists
    #[error("user {0} already exists")]
    Duplicate(i64),

    /// Value rejected before reaching the database
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Connection pool errors
    #[error("Database pool error: {0}")]
    Unavailable(#[from] r2d2::Error),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// True when SQLite rejected the statement because of a UNIQUE/PRIMARY KEY/CHECK constraint.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
