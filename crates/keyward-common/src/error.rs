//! Centralized error types for the shared layer.

/// Errors raised before any request leaves the process.
#[derive(Debug, thiserror::Error)]
pub enum KeywardError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Convenience type alias for Results using KeywardError.
pub type KeywardResult<T> = Result<T, KeywardError>;
