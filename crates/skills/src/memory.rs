//! Chat Memory
//!
//! Flat-file persistence for chat history and lookup of long-term context
//! notes. One JSON array of `{role, content}` objects per context id:
//!
//! - `chat_memory_<safe_id>.json` for a named context
//! - `chat_memory_global.json` when the prompt names none

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use interactivity_llm::Message;

const MEMORY_PREFIX: &str = "chat_memory_";
const GLOBAL_MEMORY_FILE: &str = "chat_memory_global.json";

/// Long-term context notes are cut to their last this-many characters.
pub const MAX_CONTEXT_CHARS: usize = 8000;

/// Lines scanned for a context id when the prompt has no YAML header.
const HEADER_LINES: usize = 10;

fn yaml_header() -> Option<&'static Regex> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    HEADER
        .get_or_init(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n").ok())
        .as_ref()
}

fn context_id_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"chat_context\s*:\s*([A-Za-z0-9_\-]+)",
            r"context\s*:\s*([A-Za-z0-9_\-]+)",
            r"@context\s*:\s*([A-Za-z0-9_\-]+)",
        ]
        .into_iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Normalize a context id to a filename fragment.
pub fn safe_context_id(context_id: &str) -> String {
    context_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Find the context id a prompt declares.
///
/// The header is the body of a leading `---` YAML block, or the first ten
/// lines otherwise. Patterns are tried in order; the first match wins.
pub fn extract_context_id(prompt: &str) -> Option<String> {
    let header = match yaml_header().and_then(|re| re.captures(prompt)) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
        None => prompt.lines().take(HEADER_LINES).collect::<Vec<_>>().join("\n"),
    };

    context_id_patterns()
        .iter()
        .find_map(|re| re.captures(&header))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Read `<context_dir>/<safe_id>-context.md`, keeping the tail.
pub fn load_context_text(context_dir: &Path, context_id: &str) -> Option<String> {
    let path = context_dir.join(format!("{}-context.md", safe_context_id(context_id)));
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(tail_chars(&text, MAX_CONTEXT_CHARS).to_string()),
        Err(e) => {
            tracing::warn!("Failed to read context file for '{}': {}", context_id, e);
            None
        }
    }
}

fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// History files rooted at one directory.
#[derive(Debug, Clone)]
pub struct ChatMemory {
    dir: PathBuf,
}

impl ChatMemory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// History file for a context id (`None` is the global history).
    pub fn file_for(&self, context_id: Option<&str>) -> PathBuf {
        match context_id {
            Some(id) => self
                .dir
                .join(format!("{}{}.json", MEMORY_PREFIX, safe_context_id(id))),
            None => self.dir.join(GLOBAL_MEMORY_FILE),
        }
    }

    /// Load a history. Missing files are empty; unreadable ones are empty
    /// with a warning. Entries without `role` and `content` are dropped.
    pub fn load(&self, context_id: Option<&str>) -> Vec<Message> {
        let path = self.file_for(context_id);
        if !path.exists() {
            return Vec::new();
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                serde_json::from_str::<serde_json::Value>(&raw).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(serde_json::Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value::<Message>(entry).ok())
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to load chat memory from {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Persist a history. Failures are logged, never raised.
    pub fn save(&self, context_id: Option<&str>, messages: &[Message]) {
        let path = self.file_for(context_id);
        let result = std::fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string_pretty(messages).map_err(|e| e.to_string()))
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));

        if let Err(e) = result {
            tracing::warn!("Failed to save chat memory to {}: {}", path.display(), e);
        }
    }

    /// Delete every history file. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !(name.starts_with(MEMORY_PREFIX) && name.ends_with(".json")) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to delete memory file {}: {}", name, e),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_context_id() {
        assert_eq!(safe_context_id("running"), "running");
        assert_eq!(safe_context_id("a b/c.d"), "a_b_c_d");
        assert_eq!(safe_context_id("x-y_z"), "x-y_z");
    }

    #[test]
    fn test_extract_from_yaml_header() {
        let prompt = "---\nchat_context: running\ntags: x\n---\nHow far did I run?";
        assert_eq!(extract_context_id(prompt).as_deref(), Some("running"));
    }

    #[test]
    fn test_extract_from_first_lines() {
        assert_eq!(
            extract_context_id("@context: aws\nWhat is S3?").as_deref(),
            Some("aws")
        );
        assert_eq!(
            extract_context_id("context : ea-2024\nquestion").as_deref(),
            Some("ea-2024")
        );
    }

    #[test]
    fn test_extract_ignores_lines_past_header() {
        let mut prompt = "line\n".repeat(10);
        prompt.push_str("context: late");
        assert_eq!(extract_context_id(&prompt), None);
        assert_eq!(extract_context_id("just a question"), None);
    }

    #[test]
    fn test_yaml_header_limits_search() {
        let prompt = "---\ntitle: notes\n---\ncontext: body";
        assert_eq!(extract_context_id(prompt), None);
    }

    #[test]
    fn test_file_names() {
        let memory = ChatMemory::new("/mem");
        assert_eq!(
            memory.file_for(Some("running")),
            PathBuf::from("/mem/chat_memory_running.json")
        );
        assert_eq!(
            memory.file_for(None),
            PathBuf::from("/mem/chat_memory_global.json")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ChatMemory::new(dir.path().join("nested"));
        let history = vec![Message::user("hi"), Message::assistant("hello")];

        memory.save(Some("t"), &history);
        assert_eq!(memory.load(Some("t")), history);
        assert!(memory.load(None).is_empty());
    }

    #[test]
    fn test_load_drops_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ChatMemory::new(dir.path());
        std::fs::write(
            memory.file_for(None),
            r#"[{"role":"user","content":"a"},{"role":"user"},42,{"content":"b"}]"#,
        )
        .unwrap();
        assert_eq!(memory.load(None), vec![Message::user("a")]);
    }

    #[test]
    fn test_load_unreadable_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ChatMemory::new(dir.path());
        std::fs::write(memory.file_for(Some("x")), "not json").unwrap();
        assert!(memory.load(Some("x")).is_empty());
    }

    #[test]
    fn test_clear_removes_only_history_files() {
        let dir = tempfile::tempdir().unwrap();
        let memory = ChatMemory::new(dir.path());
        memory.save(None, &[Message::user("a")]);
        memory.save(Some("x"), &[Message::user("b")]);
        std::fs::write(dir.path().join("notes.json"), "[]").unwrap();

        assert_eq!(memory.clear(), 2);
        assert!(dir.path().join("notes.json").exists());
        assert!(memory.load(Some("x")).is_empty());
    }

    #[test]
    fn test_load_context_text_truncates_tail() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("{}{}", "a".repeat(100), "b".repeat(MAX_CONTEXT_CHARS));
        std::fs::write(dir.path().join("running-context.md"), &text).unwrap();

        let loaded = load_context_text(dir.path(), "running").unwrap();
        assert_eq!(loaded.chars().count(), MAX_CONTEXT_CHARS);
        assert!(loaded.chars().all(|c| c == 'b'));
        assert!(load_context_text(dir.path(), "missing").is_none());
    }
}
