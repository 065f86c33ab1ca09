//! Room event system.
//!
//! Provides a callback-based observability layer for chatroom runs. Implement
//! [`EventHandler`] to receive notifications about run boundaries, agent selection, produced
//! messages and convergence checks.
//!
//! The single method, [`on_room_event`](EventHandler::on_room_event), has a default no-op
//! implementation. The handler is wrapped in `Arc<dyn EventHandler>` and attached with
//! [`Room::with_event_handler`](crate::Room::with_event_handler).
//!
//! # Example
//!
//! ```rust,no_run
//! use quineroom::event::{EventHandler, RoomEvent};
//! use async_trait::async_trait;
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl EventHandler for MyHandler {
//!     async fn on_room_event(&self, event: &RoomEvent) {
//!         if let RoomEvent::MessageProduced { iteration, model, .. } = event {
//!             println!("turn {} by {}", iteration, model);
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::fmt;

/// Why a run stopped producing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The convergence checker fired before the next turn.
    Converged { step_distance: usize },
    /// `max_iterations` messages were produced.
    IterationLimit,
    /// An agent or the convergence checker failed.
    Failed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Converged { step_distance } => {
                write!(f, "converged (step distance {})", step_distance)
            }
            StopReason::IterationLimit => write!(f, "iteration limit reached"),
            StopReason::Failed => write!(f, "failed"),
        }
    }
}

/// Events emitted by a [`Room`](crate::Room) while its message stream is consumed.
///
/// ```text
/// RunStarted
///   └─ per turn:
///       ├─ ConvergenceChecked
///       ├─ AgentSelected
///       └─ MessageProduced
/// RunCompleted { reason }
/// ```
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Emitted once, before the first seed message is yielded.
    RunStarted {
        models: Vec<String>,
        seed_messages: usize,
        max_iterations: usize,
    },
    /// Emitted after the convergence checker ran at the top of a turn.
    ConvergenceChecked {
        /// Length of the history the checker saw.
        history_len: usize,
        /// Smallest converging stride, `None` if the history has not converged.
        step_distance: Option<usize>,
    },
    /// An agent was drawn from the roster for this turn.
    AgentSelected {
        iteration: usize,
        model: String,
        /// Number of messages in the context handed to the agent.
        context_len: usize,
    },
    /// A new message was appended to the history.
    MessageProduced {
        iteration: usize,
        model: String,
        seed: Option<u64>,
        response_length: usize,
    },
    /// The stream is exhausted.
    RunCompleted {
        reason: StopReason,
        produced: usize,
        history_len: usize,
    },
}

/// Receives [`RoomEvent`]s. The default implementation ignores everything.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_room_event(&self, _event: &RoomEvent) {}
}

/// Forwards every event to the `log` facade.
///
/// Turn-level events go to `debug`, run boundaries to `info`, failures to `warn`.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_room_event(&self, event: &RoomEvent) {
        match event {
            RoomEvent::RunStarted {
                models,
                seed_messages,
                max_iterations,
            } => log::info!(
                "Room started: models {:?}, {} seed message(s), up to {} iterations",
                models,
                seed_messages,
                max_iterations
            ),
            RoomEvent::ConvergenceChecked {
                history_len,
                step_distance,
            } => log::debug!(
                "Convergence checked on {} messages: {:?}",
                history_len,
                step_distance
            ),
            RoomEvent::AgentSelected {
                iteration,
                model,
                context_len,
            } => log::debug!(
                "Iteration {}: {} selected with {} context message(s)",
                iteration,
                model,
                context_len
            ),
            RoomEvent::MessageProduced {
                iteration,
                model,
                seed,
                response_length,
            } => log::debug!(
                "Iteration {}: {} replied ({} chars, seed {:?})",
                iteration,
                model,
                response_length,
                seed
            ),
            RoomEvent::RunCompleted {
                reason: StopReason::Failed,
                produced,
                history_len,
            } => log::warn!(
                "Room failed after {} produced message(s), history length {}",
                produced,
                history_len
            ),
            RoomEvent::RunCompleted {
                reason,
                produced,
                history_len,
            } => log::info!(
                "Room finished: {} after {} produced message(s), history length {}",
                reason,
                produced,
                history_len
            ),
        }
    }
}
