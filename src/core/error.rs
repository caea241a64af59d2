use thiserror::Error;

use crate::storage::StoreError;

/// Centralized error types for the application
///
/// Every failure a command can hit is one of these variants. The router turns
/// them into reply texts, so none of them ends the update handler; only
/// `Config` and a `StoreUnavailable` at startup stop the process.
///
/// # Example
///
/// ```no_run
/// use referearn::core::error::AppError;
///
/// fn describe(err: &AppError) -> String {
///     format!("Error: {}", err)
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Lookup miss on a user id
    #[error("user {0} not found")]
    NotFound(i64),

    /// The user already has a record, so it can no longer be referred
    #[error("user {0} is already registered")]
    AlreadyRegistered(i64),

    /// Referrer and referee are the same user
    #[error("users cannot refer themselves")]
    SelfReferral,

    /// Some user's referral set already contains this id
    #[error("user {0} has already been referred")]
    AlreadyReferred(i64),

    /// Unparseable or out-of-range argument, caught before any store call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Non-positive or non-finite balance amount
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    /// Non-owner invoking an owner-only command
    #[error("user {0} is not authorized to use this command")]
    Unauthorized(i64),

    /// Another broadcast has not finished yet
    #[error("a broadcast is already running")]
    BroadcastInProgress,

    /// Delivery failure towards a single chat
    #[error("Telegram error: {0}")]
    Transport(String),

    /// Store connectivity or query failure
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_) | AppError::Transport(_) | AppError::BroadcastInProgress
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(id),
            StoreError::Duplicate(id) => AppError::AlreadyRegistered(id),
            StoreError::InvalidValue(msg) => AppError::InvalidInput(msg),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<teloxide::RequestError> for AppError {
    fn from(err: teloxide::RequestError) -> Self {
        AppError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_domain_errors() {
        assert!(matches!(AppError::from(StoreError::NotFound(7)), AppError::NotFound(7)));
        assert!(matches!(
            AppError::from(StoreError::Duplicate(7)),
            AppError::AlreadyRegistered(7)
        ));
        assert!(matches!(
            AppError::from(StoreError::InvalidValue("negative balance".into())),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::Database(rusqlite::Error::InvalidQuery)),
            AppError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(AppError::StoreUnavailable("down".into()).is_retryable());
        assert!(AppError::Transport("blocked".into()).is_retryable());
        assert!(!AppError::NotFound(1).is_retryable());
        assert!(!AppError::Unauthorized(1).is_retryable());
        assert!(!AppError::InvalidAmount(-1.0).is_retryable());
    }
}
