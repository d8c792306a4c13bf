//! Core Error Types
//!
//! Defines the error types shared by the runner and the skill crates. Skill
//! failures surface to the user as `Error: <message>`, so every variant's
//! `Display` is written to read well after that prefix.

use thiserror::Error;

/// Core error type for the Interactivity workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A skill was called with arguments it cannot use
    #[error("{0}")]
    InvalidArguments(String),

    /// A skill failed while running (message is shown verbatim)
    #[error("{0}")]
    Skill(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-arguments error
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a skill error
    pub fn skill(msg: impl Into<String>) -> Self {
        Self::Skill(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::config("invalid setting");
        assert_eq!(err.to_string(), "Configuration error: invalid setting");
    }

    #[test]
    fn test_skill_error_is_verbatim() {
        let err = CoreError::skill("model refused the request");
        assert_eq!(err.to_string(), "model refused the request");
    }

    #[test]
    fn test_invalid_arguments_is_verbatim() {
        let err = CoreError::invalid_arguments("plot() expects a list of numbers");
        assert_eq!(err.to_string(), "plot() expects a list of numbers");
    }

    #[test]
    fn test_not_found_display() {
        assert_eq!(CoreError::not_found("chat").to_string(), "Not found: chat");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }
}
