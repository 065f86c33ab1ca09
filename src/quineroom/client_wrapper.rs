use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;

/// A ClientWrapper is a wrapper around a remote chat-completion service.
/// It provides a common interface to interact with the LLMs.
/// It does not keep track of the conversation, for that we use a Room
/// which owns the chat history and hands each agent a bounded window of it.
// src/quineroom/client_wrapper

/// Represents the possible roles for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    // set by the developer to steer the model's responses
    User,
    // a message sent by a human user (or app user)
    Assistant, // lets the model know the content was generated as a response to a user message
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Represents a role-tagged message to be sent to an LLM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Free-form generation options forwarded with every chat request.
///
/// `seed` and `temperature` are first class because the chatroom cares about them; anything
/// else the backend understands (`top_p`, `max_tokens`, ...) goes into `extra` and is flattened
/// into the request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Failures reported by a remote chat or embedding capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The backend does not know the requested model (HTTP 404).
    ModelNotFound(String),
    /// The request did not complete within the client's bounded wait.
    Timeout,
    /// The backend answered with a non-success status.
    Http { status: u16, body: String },
    /// Connection-level failure (DNS, TLS, reset, ...).
    Transport(String),
    /// The backend answered, but the payload was not what the API promises.
    InvalidResponse(String),
}

impl ClientError {
    /// Whether re-issuing the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            ClientError::ModelNotFound(_) | ClientError::InvalidResponse(_)
        )
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::ModelNotFound(model) => write!(f, "Model not found: {}", model),
            ClientError::Timeout => write!(f, "Request timed out"),
            ClientError::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ClientError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl Error for ClientError {}

/// Trait defining the interface to a chat-completion service.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send role-tagged messages to `model` and return the assistant's reply text.
    /// - `model`: The backend model identifier.
    /// - `messages`: The conversation to complete, already role-tagged.
    /// - `options`: Generation options, including the seed.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, ClientError>;

    /// Human readable backend name used in log lines.
    fn backend_name(&self) -> &str {
        "unknown"
    }
}

/// Trait defining the interface to an embedding service.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed `text` with `model`.
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ClientError>;
}
