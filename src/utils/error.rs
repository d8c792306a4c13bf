//! Error Handling
//!
//! Errors of the runner process itself: startup and the input loop.
//! Command failures never reach this type; the engine reports them inline.

use thiserror::Error;

/// Runner-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input line could not be decoded
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for runner errors
pub type AppResult<T> = Result<T, AppError>;

impl From<std::str::Utf8Error> for AppError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::InvalidInput(format!("input is not valid UTF-8 ({})", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message() {
        let err = AppError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"));
        assert_eq!(err.to_string(), "I/O error: pipe closed");
    }

    #[test]
    fn test_utf8_error_conversion() {
        let bytes = [0x66, 0xff];
        let err = AppError::from(std::str::from_utf8(&bytes).unwrap_err());
        assert!(err.to_string().starts_with("Invalid input: input is not valid UTF-8"));
    }
}
