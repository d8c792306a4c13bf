//! Evaluation Errors
//!
//! Every variant's `Display` is the text shown after `Error: `, so messages
//! follow the wording users of the Python-flavoured language expect.

use thiserror::Error;

use interactivity_core::CoreError;

#[derive(Error, Debug)]
pub enum EvalError {
    /// Source could not be parsed
    #[error("{message} (line {line})")]
    Syntax { message: String, line: usize },

    #[error("name '{0}' is not defined")]
    Name(String),

    /// Wrong type for an operation
    #[error("{0}")]
    Type(String),

    /// Right type, bad value
    #[error("{0}")]
    Value(String),

    #[error("{0}")]
    ZeroDivision(String),

    #[error("{0}")]
    Index(String),

    /// Missing dict key; shown as the key's repr
    #[error("{0}")]
    Key(String),

    #[error("{0}")]
    Attribute(String),

    #[error("maximum recursion depth exceeded")]
    Recursion,

    #[error("{0}")]
    Overflow(String),

    /// `raise value`
    #[error("{0}")]
    Raised(String),

    /// A skill failed
    #[error("{0}")]
    Skill(#[from] CoreError),

    #[error("internal error: {0}")]
    Internal(String),

    /// Writing to the host failed; not reported back through the same stream
    #[error("I/O error: {0}")]
    Output(#[from] std::io::Error),
}

pub type EvalResult<T> = Result<T, EvalError>;

impl EvalError {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
        }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    pub fn zero_division(msg: impl Into<String>) -> Self {
        Self::ZeroDivision(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    pub fn attribute(msg: impl Into<String>) -> Self {
        Self::Attribute(msg.into())
    }

    pub fn overflow() -> Self {
        Self::Overflow("integer overflow".to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, EvalError::Syntax { .. })
    }
}
