//! Interactivity LLM
//!
//! Chat-completion plumbing used by the chat skill:
//! - `LlmProvider` - provider trait the skill talks to
//! - `OpenAIProvider` - OpenAI-compatible `/chat/completions` implementation
//! - `build_http_client` - reqwest client factory (proxy, timeout)

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use types::*;
