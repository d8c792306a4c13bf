//! Chat Skills
//!
//! `chat`, `chat4`, `chat5`, `clean_chat` and `chat_key`.
//!
//! Each prompt may name a context id in its header. The id selects the
//! history file and the long-term context note; prompts without one share
//! the global history. When the provider rejects a request as too large,
//! the oldest exchange is dropped and the request is retried.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use interactivity_core::{CoreError, CoreResult, Output, Skill, SkillCall, SkillModule};
use interactivity_llm::{
    LlmProvider, LlmRequestOptions, Message, OpenAIProvider, ProviderConfig,
};

use crate::config::ChatConfig;
use crate::memory::{extract_context_id, load_context_text, ChatMemory};
use crate::CHAT_SKILLS;

/// Printed instead of a request when no key is configured.
pub const MISSING_KEY_MESSAGE: &str =
    "Error: OpenAI API key not set. Call chat_key(\"sk-...\") or set OPENAI_API_KEY.";

const GPT4_MODEL: &str = "gpt-4o";
const GPT5_MODEL: &str = "gpt-5.2";

/// State shared by every chat callable.
struct ChatState {
    provider: Arc<dyn LlmProvider>,
    memory: ChatMemory,
    context_dir: Option<PathBuf>,
    /// Set from config at startup, replaced by `chat_key`.
    api_key: RwLock<Option<String>>,
}

/// One chat request after argument resolution.
#[derive(Debug, Clone)]
struct ChatRequest {
    prompt: String,
    system: Option<String>,
    save_context: bool,
    model: String,
}

impl ChatState {
    /// Assemble the message list sent to the provider.
    fn build_messages(
        request: &ChatRequest,
        context_id: Option<&str>,
        context_text: Option<&str>,
        history: &[Message],
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        if let (Some(id), Some(text)) = (context_id, context_text) {
            messages.push(Message::system(format!(
                "Long-term context for this conversation (topic: '{}'):\n{}",
                id, text
            )));
        }
        messages.extend(history.iter().cloned());
        messages.push(Message::user(request.prompt.clone()));
        messages
    }

    async fn chat(&self, request: ChatRequest, out: &mut Output) -> CoreResult<()> {
        let api_key = self.api_key.read().await.clone().filter(|k| !k.is_empty());
        let Some(api_key) = api_key else {
            out.log(MISSING_KEY_MESSAGE)?;
            return Ok(());
        };

        let context_id = extract_context_id(&request.prompt);
        let context_id = context_id.as_deref();

        let mut history = if request.save_context {
            self.memory.load(context_id)
        } else {
            Vec::new()
        };

        let context_text = match (context_id, self.context_dir.as_deref()) {
            (Some(id), Some(dir)) => load_context_text(dir, id),
            _ => None,
        };

        let options = LlmRequestOptions {
            model_override: Some(request.model.clone()),
            api_key_override: Some(api_key),
        };

        let reply = loop {
            let messages =
                Self::build_messages(&request, context_id, context_text.as_deref(), &history);
            tracing::debug!(
                model = %request.model,
                context = context_id.unwrap_or("global"),
                history = history.len(),
                "chat request"
            );

            match self.provider.send_message(messages, options.clone()).await {
                Ok(response) => break response.content.unwrap_or_default(),
                Err(e) if request.save_context && e.is_request_too_large() && !history.is_empty() => {
                    tracing::warn!("Chat request rejected ({}), dropping oldest exchange", e);
                    let drop = history.len().min(2);
                    history.drain(..drop);
                    self.memory.save(context_id, &history);
                }
                Err(e) => return Err(CoreError::skill(e.to_string())),
            }
        };

        if request.save_context {
            history.push(Message::user(request.prompt));
            history.push(Message::assistant(reply.clone()));
            self.memory.save(context_id, &history);
        }

        out.emit(&format!("{}\n", reply))?;
        Ok(())
    }
}

/// `chat`, `chat4`, `chat5`.
struct ChatSkill {
    name: &'static str,
    /// Model fixed by the callable; `None` honours the `model` argument.
    pinned_model: Option<&'static str>,
    default_model: String,
    state: Arc<ChatState>,
}

impl ChatSkill {
    fn resolve(&self, call: &SkillCall) -> CoreResult<ChatRequest> {
        let args = &call.args;
        let prompt = args.require_str(0, "prompt", self.name)?;
        let system = args.optional_str(1, "system")?;
        let save_context = args.bool_or(2, "save_context", true)?;
        let model = match self.pinned_model {
            Some(model) => model.to_string(),
            None => args
                .optional_str(3, "model")?
                .unwrap_or_else(|| self.default_model.clone()),
        };
        Ok(ChatRequest {
            prompt,
            system,
            save_context,
            model,
        })
    }
}

#[async_trait]
impl Skill for ChatSkill {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, call: SkillCall, out: &mut Output) -> CoreResult<()> {
        let request = self.resolve(&call)?;
        self.state.chat(request, out).await
    }
}

/// `clean_chat()`: delete every stored history.
struct CleanChatSkill {
    state: Arc<ChatState>,
}

#[async_trait]
impl Skill for CleanChatSkill {
    fn name(&self) -> &str {
        "clean_chat"
    }

    async fn invoke(&self, _call: SkillCall, _out: &mut Output) -> CoreResult<()> {
        let removed = self.state.memory.clear();
        tracing::info!(
            "Removed {} chat history file(s) from {}",
            removed,
            self.state.memory.dir().display()
        );
        Ok(())
    }
}

/// `chat_key(key)`: set the API key for the rest of the session.
struct ChatKeySkill {
    state: Arc<ChatState>,
}

#[async_trait]
impl Skill for ChatKeySkill {
    fn name(&self) -> &str {
        "chat_key"
    }

    async fn invoke(&self, call: SkillCall, _out: &mut Output) -> CoreResult<()> {
        let key = call.args.require_str(0, "key", "chat_key")?;
        *self.state.api_key.write().await = Some(key.trim().to_string());
        Ok(())
    }
}

/// The chat skill module.
pub struct ChatModule {
    state: Arc<ChatState>,
    default_model: String,
}

impl ChatModule {
    /// Build the module around an existing provider.
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        let state = ChatState {
            provider,
            memory: ChatMemory::new(config.resolved_memory_dir()),
            context_dir: config.context_dir.clone(),
            api_key: RwLock::new(config.api_key.clone()),
        };
        Self {
            state: Arc::new(state),
            default_model: config.model.clone(),
        }
    }

    /// Build the module with the OpenAI-compatible provider.
    pub fn from_config(config: &ChatConfig) -> CoreResult<Self> {
        let provider_config = ProviderConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            proxy: config.proxy.clone(),
            timeout_secs: config.timeout_secs,
            ..Default::default()
        };
        let provider = OpenAIProvider::new(provider_config)
            .map_err(|e| CoreError::skill(format!("Error: chat client unavailable: {}", e)))?;
        Ok(Self::new(Arc::new(provider), config))
    }
}

impl SkillModule for ChatModule {
    fn name(&self) -> &str {
        "chat"
    }

    fn availability(&self) -> Result<(), String> {
        Ok(())
    }

    fn skill_names(&self) -> Vec<String> {
        CHAT_SKILLS.iter().map(|s| s.to_string()).collect()
    }

    fn skills(&self) -> Vec<Arc<dyn Skill>> {
        let chat = |name: &'static str, pinned_model: Option<&'static str>| -> Arc<dyn Skill> {
            Arc::new(ChatSkill {
                name,
                pinned_model,
                default_model: self.default_model.clone(),
                state: self.state.clone(),
            })
        };
        vec![
            chat("chat", None),
            chat("chat4", Some(GPT4_MODEL)),
            chat("chat5", Some(GPT5_MODEL)),
            Arc::new(CleanChatSkill {
                state: self.state.clone(),
            }),
            Arc::new(ChatKeySkill {
                state: self.state.clone(),
            }),
        ]
    }
}
