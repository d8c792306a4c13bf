//! OpenAI Provider
//!
//! Implementation of the LlmProvider trait for OpenAI-compatible
//! `/chat/completions` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, UsageStats,
};
use crate::http_client::build_http_client;

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(
            config.proxy.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self { config, client })
    }

    /// Get the API endpoint
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    /// Reasoning models reject a custom temperature.
    fn model_supports_temperature(model: &str) -> bool {
        let model = model.to_lowercase();
        !(model.starts_with("o1") || model.starts_with("o3") || model.starts_with("gpt-5"))
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let model = request_options
            .model_override
            .as_deref()
            .unwrap_or(&self.config.model);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        if let Some(max_tokens) = self.config.max_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(temperature) = self.config.temperature {
            if Self::model_supports_temperature(model) {
                body["temperature"] = serde_json::json!(temperature);
            }
        }

        body
    }

    /// Parse the API response into our format
    fn parse_response(&self, response: &OpenAIResponse) -> LlmResponse {
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone());

        let usage = response
            .usage
            .as_ref()
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            model: response.model.clone(),
            usage,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let api_key = request_options
            .api_key_override
            .as_ref()
            .or(self.config.api_key.as_ref())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let body = self.build_request_body(&messages, &request_options);

        tracing::debug!(
            model = %body["model"],
            messages = messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(self.base_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&openai_response))
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
            temperature: Some(0.7),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new(test_config()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o");
        assert_eq!(provider.base_url(), OPENAI_API_URL);
    }

    #[test]
    fn test_custom_base_url() {
        let config = ProviderConfig {
            base_url: Some("http://localhost:11434/v1/chat/completions".to_string()),
            ..test_config()
        };
        let provider = OpenAIProvider::new(config).unwrap();
        assert_eq!(
            provider.base_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_messages_in_order() {
        let provider = OpenAIProvider::new(test_config()).unwrap();
        let messages = vec![
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("again"),
        ];
        let body = provider.build_request_body(&messages, &LlmRequestOptions::default());

        assert_eq!(body["model"], "gpt-4o");
        let sent = body["messages"].as_array().unwrap();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0]["role"], "system");
        assert_eq!(sent[3]["content"], "again");
        assert!(body.get("max_completion_tokens").is_none());
        assert!(body["temperature"].as_f64().is_some());
    }

    #[test]
    fn test_model_override_drops_temperature_for_reasoning_models() {
        let provider = OpenAIProvider::new(test_config()).unwrap();
        let options = LlmRequestOptions {
            model_override: Some("gpt-5.2".to_string()),
            ..Default::default()
        };
        let body = provider.build_request_body(&[Message::user("hi")], &options);
        assert_eq!(body["model"], "gpt-5.2");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let provider = OpenAIProvider::new(test_config()).unwrap();
        let raw = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let response = provider.parse_response(&parsed);
        assert_eq!(response.content.as_deref(), Some("Hi there"));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn test_parse_response_null_content() {
        let provider = OpenAIProvider::new(test_config()).unwrap();
        let raw = r#"{"model": "gpt-4o", "choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        assert!(provider.parse_response(&parsed).content.is_none());
    }

    #[tokio::test]
    async fn test_send_message_without_key_fails_before_network() {
        let config = ProviderConfig {
            api_key: None,
            ..test_config()
        };
        let provider = OpenAIProvider::new(config).unwrap();
        let err = provider
            .send_message(vec![Message::user("hi")], LlmRequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed { .. }));
    }
}
