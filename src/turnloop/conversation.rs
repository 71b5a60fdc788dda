//! Conversation history and the prompt the model sees.
//!
//! The transcript the engine keeps is richer than what goes on the wire:
//! internally tool results carry [`Role::Tool`], while the wire rendering
//! folds them into user-role messages with a `[tool_name]:` prefix so any
//! backend can consume them.

use crate::turnloop::client_wrapper::{Message, Role};
use crate::turnloop::tool_registry::ToolDescriptor;
use log::debug;

/// Rough token estimate: four characters per token holds well enough across
/// tokenizers for budget enforcement.
pub fn estimate_token_count(text: &str) -> usize {
    text.len() / 4
}

/// Build the system prompt: the caller's base instructions followed by the
/// tool protocol section listing every registered tool.
pub fn build_system_prompt(base: &str, tools: &[ToolDescriptor]) -> String {
    let mut prompt = base.trim_end().to_string();
    if tools.is_empty() {
        return prompt;
    }

    prompt.push_str("\n\nYou can use tools. To call a tool, emit a fenced block tagged `tool` containing a JSON object:\n\n```tool\n{\"name\": \"tool_name\", \"args\": {}}\n```\n\nEach result is returned to you before you continue. Available tools:\n");
    for tool in tools {
        prompt.push_str(&format!("\n- {}: {}", tool.name, tool.description));
        if let Some(props) = tool.parameters.get("properties").and_then(|p| p.as_object()) {
            if !props.is_empty() {
                let names: Vec<&str> = props.keys().map(|k| k.as_str()).collect();
                prompt.push_str(&format!(" (args: {})", names.join(", ")));
            }
        }
    }
    prompt
}

/// An append-only transcript with a token budget.
pub struct Conversation {
    system_prompt: String,
    history: Vec<Message>,
    max_tokens: usize,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            max_tokens,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
        self.trim_to_budget();
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::Assistant, content));
    }

    /// Fold a tool result into history as `[tool_name]: content`.
    pub fn push_tool_result(&mut self, tool_name: &str, content: &str) {
        self.push(Message::new(
            Role::Tool,
            format!("[{}]: {}", tool_name, content),
        ));
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// The message sequence as a backend expects it: system prompt first,
    /// then history in order.
    pub fn wire_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(Message::new(Role::System, self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages
    }

    fn token_count(&self) -> usize {
        estimate_token_count(&self.system_prompt)
            + self
                .history
                .iter()
                .map(|m| estimate_token_count(&m.content))
                .sum::<usize>()
    }

    /// Drop the oldest messages until the estimate fits the budget. The
    /// system prompt always survives; the most recent message always
    /// survives even if it alone busts the budget.
    fn trim_to_budget(&mut self) {
        while self.history.len() > 1 && self.token_count() > self.max_tokens {
            let dropped = self.history.remove(0);
            debug!(
                "trimmed {:?} message of ~{} tokens",
                dropped.role,
                estimate_token_count(&dropped.content)
            );
        }
    }
}

/// Truncate a tool result for the transcript, marking the cut.
pub fn clip_result(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_string();
    }
    let clipped: String = content.chars().take(limit).collect();
    format!("{}... (truncated)", clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn estimate_scales_with_length() {
        assert_eq!(estimate_token_count(""), 0);
        assert_eq!(estimate_token_count("12345678"), 2);
    }

    #[test]
    fn system_prompt_lists_tools_with_arg_names() {
        let tools = vec![
            ToolDescriptor::new(
                "read_file",
                "Read a file's contents",
                json!({"type": "object", "properties": {"path": {"type": "string"}}}),
            ),
            ToolDescriptor::new("git_status", "Show working tree status", json!({})),
        ];
        let prompt = build_system_prompt("You are a coding assistant.", &tools);
        assert!(prompt.starts_with("You are a coding assistant."));
        assert!(prompt.contains("- read_file: Read a file's contents (args: path)"));
        assert!(prompt.contains("- git_status: Show working tree status"));
        assert!(prompt.contains("```tool"));
    }

    #[test]
    fn no_tools_means_no_protocol_section() {
        let prompt = build_system_prompt("Base.", &[]);
        assert_eq!(prompt, "Base.");
    }

    #[test]
    fn wire_messages_lead_with_system() {
        let mut convo = Conversation::new("sys", 1000);
        convo.push_user("hello");
        let wire = convo.wire_messages();
        assert_eq!(wire[0].role, Role::System);
        assert_eq!(wire[1].role, Role::User);
    }

    #[test]
    fn tool_results_fold_with_name_prefix() {
        let mut convo = Conversation::new("sys", 1000);
        convo.push_tool_result("read_file", "print(1)");
        assert_eq!(convo.history()[0].role, Role::Tool);
        assert_eq!(convo.history()[0].content, "[read_file]: print(1)");
    }

    #[test]
    fn oldest_messages_trim_first() {
        // Budget of 10 tokens = 40 chars; each message is 20 chars = 5 tokens.
        let mut convo = Conversation::new("", 10);
        convo.push_user("a".repeat(20));
        convo.push_assistant("b".repeat(20));
        convo.push_user("c".repeat(20));
        assert_eq!(convo.history().len(), 2);
        assert!(convo.history()[0].content.starts_with('b'));
    }

    #[test]
    fn latest_message_survives_even_over_budget() {
        let mut convo = Conversation::new("", 1);
        convo.push_user("x".repeat(400));
        assert_eq!(convo.history().len(), 1);
    }

    #[test]
    fn clip_marks_truncation() {
        assert_eq!(clip_result("short", 100), "short");
        let clipped = clip_result(&"y".repeat(50), 10);
        assert!(clipped.starts_with("yyyyyyyyyy"));
        assert!(clipped.ends_with("... (truncated)"));
        assert_eq!(clipped.chars().filter(|&c| c == 'y').count(), 10);
    }
}
