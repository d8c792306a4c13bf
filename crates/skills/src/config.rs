//! Skill Configuration
//!
//! Resolved once at startup from, in increasing precedence:
//! 1. built-in defaults
//! 2. `<config_dir>/interactivity/skills.toml`
//! 3. environment variables

use std::path::{Path, PathBuf};

use serde::Deserialize;

use interactivity_core::{CoreError, CoreResult};

/// Directory name used under the platform config and data directories.
const APP_DIR: &str = "interactivity";

/// Config file name inside `<config_dir>/interactivity/`.
const CONFIG_FILE: &str = "skills.toml";

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_CHAT_MODEL: &str = "INTERACTIVITY_CHAT_MODEL";
pub const ENV_MEMORY_DIR: &str = "INTERACTIVITY_MEMORY_DIR";
pub const ENV_CONTEXT_DIR: &str = "INTERACTIVITY_CONTEXT_DIR";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-5.2";

/// Configuration for all skill modules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    pub chat: ChatConfig,
}

/// Chat skill settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    /// Full chat-completions endpoint of an OpenAI-compatible server.
    pub base_url: Option<String>,
    pub model: String,
    /// Where `chat_memory_*.json` files live.
    pub memory_dir: Option<PathBuf>,
    /// Where `<id>-context.md` long-term context notes live.
    pub context_dir: Option<PathBuf>,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            memory_dir: None,
            context_dir: None,
            proxy: None,
            timeout_secs: 120,
        }
    }
}

impl ChatConfig {
    /// Memory directory, falling back to `<data_dir>/interactivity/chat`.
    pub fn resolved_memory_dir(&self) -> PathBuf {
        self.memory_dir.clone().unwrap_or_else(default_memory_dir)
    }
}

/// Default location of `skills.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn default_memory_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("chat")
}

impl SkillsConfig {
    /// Load configuration from the default file and the process environment.
    pub fn load() -> CoreResult<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| CoreError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::config(e.to_string()))
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.chat.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.chat.base_url = Some(url);
        }
        if let Some(model) = get(ENV_CHAT_MODEL) {
            self.chat.model = model;
        }
        if let Some(dir) = get(ENV_MEMORY_DIR) {
            self.chat.memory_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_CONTEXT_DIR) {
            self.chat.context_dir = Some(PathBuf::from(dir));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SkillsConfig::default();
        assert_eq!(config.chat.model, DEFAULT_CHAT_MODEL);
        assert!(config.chat.api_key.is_none());
        assert!(config.chat.context_dir.is_none());
        assert!(config
            .chat
            .resolved_memory_dir()
            .ends_with(Path::new("interactivity").join("chat")));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SkillsConfig::from_toml_str(
            r#"
[chat]
model = "gpt-4o"
context_dir = "/vault/_chat_context"
"#,
        )
        .unwrap();
        assert_eq!(config.chat.model, "gpt-4o");
        assert_eq!(
            config.chat.context_dir.as_deref(),
            Some(Path::new("/vault/_chat_context"))
        );
        assert_eq!(config.chat.timeout_secs, 120);
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = SkillsConfig::from_toml_str("[chat\nmodel =").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = SkillsConfig::from_toml_str("[chat]\nmodel = \"gpt-4o\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk-env"),
            (ENV_CHAT_MODEL, "gpt-5.2"),
            (ENV_MEMORY_DIR, "/tmp/mem"),
            (ENV_BASE_URL, "  "),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.chat.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.chat.model, "gpt-5.2");
        assert_eq!(config.chat.resolved_memory_dir(), PathBuf::from("/tmp/mem"));
        assert!(config.chat.base_url.is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills.toml");
        std::fs::write(&path, "[chat]\napi_key = \"sk-file\"\n").unwrap();
        let config = SkillsConfig::from_file(&path).unwrap();
        assert_eq!(config.chat.api_key.as_deref(), Some("sk-file"));
    }
}
