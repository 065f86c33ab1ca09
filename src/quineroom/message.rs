//! The [`Message`] record: one utterance in a chatroom.
//!
//! Messages are immutable once created. Seed prompts carry the source label `"given"`;
//! everything an agent produces carries the agent's model name and the seed the backend was
//! called with.
//!
//! ```
//! use quineroom::Message;
//!
//! let hello = Message::given("Hi");
//! assert_eq!(hello.model, "given");
//! assert_eq!(hello.to_string(), "given: Hi");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source label used for prompts that seed the chat history.
pub const GIVEN_LABEL: &str = "given";

/// One utterance in the chat history.
///
/// Serialises as `{"content": ..., "model": ..., "seed": ...}`, the layout used by the JSON
/// chatroom logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The text of the utterance.
    pub content: String,
    /// Which agent produced the message, or [`GIVEN_LABEL`] for seed prompts.
    pub model: String,
    /// Seed forwarded to the backend for this generation, if any.
    pub seed: Option<u64>,
}

impl Message {
    /// Create a message attributed to `model`.
    pub fn new(content: impl Into<String>, model: impl Into<String>, seed: Option<u64>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            seed,
        }
    }

    /// Create a seed prompt message (`model == "given"`, no seed).
    pub fn given(content: impl Into<String>) -> Self {
        Self::new(content, GIVEN_LABEL, None)
    }

    /// Whether this message was supplied as an initial prompt rather than generated.
    pub fn is_given(&self) -> bool {
        self.model == GIVEN_LABEL
    }

    /// Terminal rendering: the model label in bold red, followed by the content.
    pub fn render(&self) -> String {
        format!("\x1b[1;31m{}\x1b[0m: {}", self.model, self.content)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_messages_have_no_seed() {
        let msg = Message::given("Hello!");
        assert!(msg.is_given());
        assert_eq!(msg.seed, None);
    }

    #[test]
    fn serialises_with_log_field_names() {
        let msg = Message::new("LOL", "qwen:0.5b-chat", Some(42));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"content": "LOL", "model": "qwen:0.5b-chat", "seed": 42})
        );

        let given = serde_json::to_value(Message::given("Hi")).unwrap();
        assert!(given["seed"].is_null());
    }

    #[test]
    fn render_keeps_content_verbatim() {
        let msg = Message::new("[not markup]", "a", None);
        assert!(msg.render().ends_with(": [not markup]"));
        assert!(msg.render().contains("a"));
    }
}
