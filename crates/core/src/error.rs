//! Core Error Types
//!
//! Errors raised by the pure, storage-free part of Limpha. The main crate
//! wraps these in its own `AppError`.

use thiserror::Error;

/// Core error type for the Limpha workspace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
