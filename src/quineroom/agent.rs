//! Agent System
//!
//! This module provides [`ModelAgent`]: one chatroom participant backed by a remote model.
//! Given the bounded context the room hands it (the contents of the last few messages), an
//! agent produces the next [`Message`].
//!
//! # Role assignment
//!
//! The room does not track who wrote which message, but chat backends insist on alternating
//! roles. The agent therefore tags roles purely by position: with the system preamble (if any)
//! prepended to the context, entry `i` of `n` entries becomes `system` when
//! `i % 2 == n % 2` and `user` otherwise. The newest entry is always `user`.
//!
//! ```text
//! preamble, c0, c1, c2   (n = 4)
//! system    user system user
//! ```
//!
//! # Seeds
//!
//! A seed configured through [`ChatOptions`] is forwarded on every call. Without one, the agent
//! draws a fresh seed in `0..=10^10` per call from its own RNG, which can itself be seeded
//! with [`ModelAgent::with_rng_seed`] for reproducible runs. Either way the seed actually used
//! is recorded on the produced message.
//!
//! # Example
//!
//! ```rust,no_run
//! use quineroom::ModelAgent;
//! use quineroom::clients::{init_client, ClientConfig};
//!
//! # async {
//! let client = init_client(ClientConfig::from_env_file(".env").unwrap()).unwrap();
//! let agent = ModelAgent::new("qwen:0.5b-chat", client)
//!     .with_system_prompt("You are a friendly chatbot, just chatting with humans.");
//!
//! let reply = agent.generate(&["Hi".to_string()]).await.unwrap();
//! println!("{}", reply);
//! # };
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

use crate::quineroom::client_wrapper::{
    ChatMessage, ChatOptions, ClientError, ClientWrapper, Role,
};
use crate::quineroom::clients::common::{with_retries, DEFAULT_ATTEMPTS};
use crate::quineroom::message::Message;

/// Upper bound (inclusive) for seeds drawn when none is configured.
pub const MAX_DRAWN_SEED: u64 = 10_000_000_000;

/// A chatroom participant backed by a remote chat model.
pub struct ModelAgent {
    /// Backend model identifier; also the message source label.
    name: String,
    /// Optional preamble prepended to every context.
    system_prompt: String,
    /// Generation options forwarded with every call.
    options: ChatOptions,
    client: Arc<dyn ClientWrapper>,
    /// Source of per-call seeds.
    rng: Mutex<StdRng>,
    /// Attempt budget per chat call.
    attempts: usize,
}

impl ModelAgent {
    /// Create an agent for `name` talking through `client`.
    pub fn new(name: impl Into<String>, client: Arc<dyn ClientWrapper>) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
            options: ChatOptions::default(),
            client,
            rng: Mutex::new(StdRng::from_entropy()),
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Make the per-call seed sequence deterministic.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Role-tag `context` for the backend, preamble first.
    pub fn build_messages(&self, context: &[String]) -> Vec<ChatMessage> {
        let mut entries: Vec<&str> = Vec::with_capacity(context.len() + 1);
        if !self.system_prompt.is_empty() {
            entries.push(&self.system_prompt);
        }
        entries.extend(context.iter().map(String::as_str));

        let total = entries.len();
        entries
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let role = if i % 2 == total % 2 {
                    Role::System
                } else {
                    Role::User
                };
                ChatMessage::new(role, content)
            })
            .collect()
    }

    fn draw_seed(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..=MAX_DRAWN_SEED)
    }

    /// Produce the next message from `context`.
    ///
    /// The chat call is retried up to the attempt budget without backoff; the last error is
    /// returned once the budget is spent.
    pub async fn generate(&self, context: &[String]) -> Result<Message, ClientError> {
        let seed = self.options.seed.unwrap_or_else(|| self.draw_seed());
        let options = ChatOptions {
            seed: Some(seed),
            ..self.options.clone()
        };
        let messages = self.build_messages(context);

        let content = with_retries(self.attempts, |attempt| {
            log::debug!(
                "ModelAgent::generate(...): {} attempt {} with {} message(s) via {}",
                self.name,
                attempt,
                messages.len(),
                self.client.backend_name()
            );
            self.client.chat(&self.name, &messages, &options)
        })
        .await?;

        Ok(Message::new(content, self.name.clone(), Some(seed)))
    }
}

impl std::fmt::Debug for ModelAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAgent")
            .field("name", &self.name)
            .field("system_prompt", &self.system_prompt)
            .field("options", &self.options)
            .finish()
    }
}
