//! LLM Types
//!
//! Core types for chat-completion requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model used when neither the call nor the configuration names one.
pub const DEFAULT_MODEL: &str = "gpt-5.2";

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single text message.
///
/// Serializes as `{"role": ..., "content": ...}`, which is also the on-disk
/// format of chat history files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// Configuration for a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override (full `/chat/completions` endpoint)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default model name
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum completion tokens (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Proxy URL, e.g. `http://127.0.0.1:8080` or `socks5://...`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            max_tokens: None,
            temperature: None,
            proxy: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmRequestOptions {
    /// Model for this request instead of the configured one.
    pub model_override: Option<String>,
    /// API key for this request instead of the configured one.
    pub api_key_override: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Complete response from a provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    /// Reply text (`None` when the model returned no content)
    pub content: Option<String>,
    /// Model that produced the reply
    pub model: String,
    pub usage: UsageStats,
}

/// Errors from provider operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Authentication failed (missing or invalid API key)
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Rate limit exceeded
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Model not found or not available
    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    /// Invalid request (bad parameters)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Prompt plus history does not fit the model's context window
    #[error("Context length exceeded: {message}")]
    ContextLengthExceeded { message: String },

    /// Server error from the provider
    #[error("Server error ({status}): {message}")]
    ServerError { message: String, status: u16 },

    /// Network/connection error
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// Response parsing error
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// Other error
    #[error("{message}")]
    Other { message: String },
}

impl LlmError {
    /// Whether shrinking the request (dropping history) could make it succeed.
    pub fn is_request_too_large(&self) -> bool {
        matches!(
            self,
            LlmError::ContextLengthExceeded { .. } | LlmError::InvalidRequest { .. }
        )
    }
}

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;
