//! # Application Error Types
//!
//! Startup errors (configuration and storage setup) are typed as [`AppError`];
//! request-time plumbing uses `anyhow` and reports through [`error_logging`].

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Storage setup errors (connection, schema)
    Storage(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Storage(msg) => write!(f, "[STORAGE] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log storage operation errors with contextual information
    pub fn log_storage_error(error: &impl std::fmt::Display, operation: &str, user_id: Option<i64>) {
        metrics::counter!("storage_errors_total", "operation" => operation.to_string()).increment(1);
        error!(
            error = %error,
            operation = %operation,
            user_id = ?user_id,
            "Storage operation failed"
        );
    }

    /// Log Telegram API errors with chat context
    pub fn log_telegram_error(error: &impl std::fmt::Display, operation: &str, chat_id: Option<i64>) {
        error!(
            error = %error,
            operation = %operation,
            chat_id = ?chat_id,
            "Telegram operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            "Configuration error"
        );
    }
}
