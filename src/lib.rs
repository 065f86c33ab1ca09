//! # QuineRoom
//!
//! QuineRoom puts several language-model agents in one chatroom, lets them talk, and stops the
//! conversation as soon as it collapses into a self-repeating pattern, a *quine*.
//!
//! The crate provides layered abstractions for:
//!
//! * **Messages**: immutable [`Message`] records that make up an append-only chat history
//! * **Similarity checks**: the closed [`SimilarityMetric`] set (equality, cosine over embeddings,
//!   Jaro, fuzzy ratio) deciding whether consecutive utterances "look the same"
//! * **Convergence detection**: the multi-stride [`ConvergenceChecker`] scan that decides when a
//!   conversation has stabilised
//! * **Agents**: [`ModelAgent`] turns a bounded context window into the next message through a
//!   [`ClientWrapper`]
//! * **Orchestration**: [`Room`] owns the roster and the history and drives the turn-taking loop
//!   through a pull-based [`MessageStream`]
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quineroom::clients::{init_client, ClientConfig};
//! use quineroom::{ConvergenceChecker, ModelAgent, Room, SimilarityMetric};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     quineroom::init_logger();
//!
//!     let client = init_client(ClientConfig::from_env_file(".env")?)?;
//!     let agents = vec![
//!         ModelAgent::new("qwen:0.5b-chat", client.clone()),
//!         ModelAgent::new("tinydolphin:1.1b", client.clone())
//!             .with_system_prompt("Reply to any question with LOL."),
//!     ];
//!
//!     let checker = ConvergenceChecker::new(3, 5, SimilarityMetric::FuzzyRatio { threshold: 99.0 })?;
//!     let mut room = Room::new(agents, vec!["Hi".to_string()], 10, 50, checker)?;
//!
//!     let mut stream = room.generate_messages();
//!     while let Some(message) = stream.next().await? {
//!         println!("{}", message);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications embedding QuineRoom can opt-in to `RUST_LOG` driven diagnostics without
/// choosing a logging backend upfront.
///
/// ```rust
/// quineroom::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod quineroom;

pub use quineroom::agent::ModelAgent;
pub use quineroom::checks::SimilarityMetric;
pub use quineroom::client_wrapper;
pub use quineroom::client_wrapper::{
    ChatMessage, ChatOptions, ClientError, ClientWrapper, EmbeddingClient, Role,
};
pub use quineroom::clients;
pub use quineroom::config;
pub use quineroom::config::{ConfigError, MetricKind, RoomSettings};
pub use quineroom::convergence::ConvergenceChecker;
pub use quineroom::event;
pub use quineroom::event::{EventHandler, LoggingEventHandler, RoomEvent, StopReason};
pub use quineroom::message::Message;
pub use quineroom::room::{MessageStream, Room, RoomError, RoomLog, RoomLogConfig};
