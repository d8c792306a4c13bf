//! Message Router
//!
//! Classifies each input line as a JSON envelope or plain text. Envelopes
//! replace the shared context and carry the command; plain text is the
//! command itself.

use serde_json::{Map, Value};

use interactivity_core::SharedContext;

/// Marker the host may leave around a command block.
pub const COMMAND_MARKER: &str = "%%%";

/// A structured message from the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub frontmatter: Option<Map<String, Value>>,
    pub context: Option<Map<String, Value>>,
    pub command: String,
}

impl Envelope {
    /// Parse a line as an envelope. `None` when it is not a JSON object.
    ///
    /// Fields of the wrong type are treated as absent.
    pub fn parse(line: &str) -> Option<Self> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(line).ok()? else {
            return None;
        };

        let frontmatter = take_object(&mut fields, "frontmatter");
        let context = take_object(&mut fields, "context");
        let command = match fields.remove("command") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(command)) => command,
            Some(other) => {
                tracing::warn!("Ignoring envelope 'command' of unexpected type: {}", other);
                String::new()
            }
        };

        Some(Self {
            frontmatter,
            context,
            command,
        })
    }
}

fn take_object(fields: &mut Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    match fields.remove(key) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            tracing::warn!("Ignoring envelope '{}' of unexpected type: {}", key, other);
            None
        }
    }
}

/// Turn one input line into the command text, updating `context` when the
/// line is an envelope.
pub fn route(line: &str, context: &mut SharedContext) -> String {
    let line = line.trim();
    if line.is_empty() {
        return String::new();
    }

    if line.starts_with('{') {
        if let Some(envelope) = Envelope::parse(line) {
            tracing::debug!(
                "Envelope received: frontmatter={:?} context={:?} command={:?}",
                envelope.frontmatter,
                envelope.context,
                envelope.command.chars().take(50).collect::<String>()
            );
            context.replace(envelope.frontmatter, envelope.context);
            return envelope.command;
        }
    }

    line.to_string()
}

/// Strip surrounding `%%%` markers and whitespace. `None` if nothing is left.
pub fn normalize_command(command: &str) -> Option<String> {
    let mut command = command.trim();
    if let Some(rest) = command.strip_prefix(COMMAND_MARKER) {
        command = rest;
    }
    if let Some(rest) = command.strip_suffix(COMMAND_MARKER) {
        command = rest;
    }
    let command = command.trim();
    if command.is_empty() {
        None
    } else {
        Some(command.to_string())
    }
}
