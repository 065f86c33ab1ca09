//! The chatroom: agent roster, shared chat history, and the turn-taking loop.
//!
//! A [`Room`] is seeded with initial prompts and then driven through a [`MessageStream`], a
//! pull-based, forward-only cursor over the room's history:
//!
//! 1. the stream first yields every message already in the history (the seed prompts);
//! 2. then, up to `max_iterations` times, it runs the [`ConvergenceChecker`] on the history
//!    **before** doing any work, stops if the history has converged, and otherwise picks an
//!    agent uniformly at random, hands it the contents of the last `max_memory` messages,
//!    appends the reply to the history and yields it.
//!
//! The stream borrows the room mutably, so the history has exactly one writer while a run is
//! in progress. Once exhausted the stream keeps returning `None`; a new stream re-yields the
//! history and then runs again against the grown history.
//!
//! ```rust,no_run
//! # use quineroom::{ConvergenceChecker, ModelAgent, Room, SimilarityMetric};
//! # async fn demo(agents: Vec<ModelAgent>) -> Result<(), Box<dyn std::error::Error>> {
//! let checker = ConvergenceChecker::new(3, 5, SimilarityMetric::Equality)?;
//! let mut room = Room::new(agents, vec!["Hi".into()], 10, 50, checker)?;
//!
//! let mut stream = room.generate_messages();
//! while let Some(message) = stream.next().await? {
//!     println!("{}", message);
//! }
//! println!("stopped: {:?}", stream.stop_reason());
//!
//! let path = room.to_disk("./log2/")?;
//! println!("saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::quineroom::agent::ModelAgent;
use crate::quineroom::checks::SimilarityMetric;
use crate::quineroom::client_wrapper::{ClientError, ClientWrapper, EmbeddingClient};
use crate::quineroom::config::{ConfigError, MetricKind, RoomSettings};
use crate::quineroom::convergence::ConvergenceChecker;
use crate::quineroom::event::{EventHandler, RoomEvent, StopReason};
use crate::quineroom::message::Message;

/// Prefix of every chatroom log file name.
pub const LOG_FILE_PREFIX: &str = "log2_";

/// Failures while running or persisting a room.
#[derive(Debug)]
pub enum RoomError {
    /// An agent's chat call failed after its retry budget.
    Agent { agent: String, source: ClientError },
    /// The convergence checker could not evaluate the history.
    Convergence(ClientError),
    Io(io::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::Agent { agent, source } => write!(f, "Agent {} failed: {}", agent, source),
            RoomError::Convergence(err) => write!(f, "Convergence check failed: {}", err),
            RoomError::Io(err) => write!(f, "I/O error: {}", err),
            RoomError::Serde(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl Error for RoomError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RoomError::Agent { source, .. } => Some(source),
            RoomError::Convergence(err) => Some(err),
            RoomError::Io(err) => Some(err),
            RoomError::Serde(err) => Some(err),
        }
    }
}

impl From<io::Error> for RoomError {
    fn from(err: io::Error) -> Self {
        RoomError::Io(err)
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        RoomError::Serde(err)
    }
}

/// The `config` block of a persisted chatroom log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLogConfig {
    pub max_iterations: usize,
    pub max_memory: usize,
    pub models: Vec<String>,
    pub system_prompts: Vec<String>,
}

/// A persisted chatroom: its configuration and the full chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLog {
    pub config: RoomLogConfig,
    pub chat_history: Vec<Message>,
}

impl RoomLog {
    /// Read a log previously written by [`Room::to_disk`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RoomError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// File name for a log written at `timestamp`, at second granularity.
    ///
    /// Two saves within the same second produce the same name.
    pub fn file_name(timestamp: chrono::DateTime<chrono::Local>) -> String {
        format!(
            "{}{}.json",
            LOG_FILE_PREFIX,
            timestamp.format("%Y_%m_%d_%H_%M_%S")
        )
    }
}

/// A chatroom of model agents sharing one append-only history.
pub struct Room {
    agents: Vec<ModelAgent>,
    chat_history: Vec<Message>,
    /// Context window: how many trailing messages an agent sees.
    max_memory: usize,
    max_iterations: usize,
    checker: ConvergenceChecker,
    /// Agent choice.
    rng: StdRng,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Room {
    /// Create a room whose history is seeded with `initial_prompts`.
    ///
    /// Fails if the roster is empty or the context window is zero.
    pub fn new(
        agents: Vec<ModelAgent>,
        initial_prompts: Vec<String>,
        max_memory: usize,
        max_iterations: usize,
        checker: ConvergenceChecker,
    ) -> Result<Self, ConfigError> {
        if agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        if max_memory < 1 {
            return Err(ConfigError::InvalidContextWindow(max_memory));
        }
        Ok(Self {
            agents,
            chat_history: initial_prompts.into_iter().map(Message::given).collect(),
            max_memory,
            max_iterations,
            checker,
            rng: StdRng::from_entropy(),
            event_handler: None,
        })
    }

    /// Build a room from [`RoomSettings`], validating everything first.
    ///
    /// `client` backs every agent; `embedder` is only needed for the cosine metric. With a seed
    /// configured, the room's RNG is seeded from it and each agent's seed RNG is derived from
    /// that generator in roster order.
    pub fn from_settings(
        settings: &RoomSettings,
        client: Arc<dyn ClientWrapper>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let system_prompts = settings.resolve_system_prompts()?;

        let metric = match settings.metric {
            MetricKind::Equality => SimilarityMetric::Equality,
            MetricKind::Jaro => SimilarityMetric::JaroSimilarity {
                threshold: settings.threshold,
            },
            MetricKind::Fuzzy => SimilarityMetric::FuzzyRatio {
                threshold: settings.threshold,
            },
            MetricKind::Cosine => {
                let model = settings
                    .embedding_model
                    .clone()
                    .ok_or(ConfigError::MissingEmbeddingModel)?;
                let embedder = embedder.ok_or(ConfigError::MissingEmbeddingModel)?;
                SimilarityMetric::cosine(embedder, model, settings.threshold)
            }
        };
        let checker = ConvergenceChecker::new(
            settings.min_quine_length,
            settings.max_step_distance,
            metric,
        )?;

        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let agents = settings
            .models
            .iter()
            .zip(system_prompts)
            .map(|(model, system_prompt)| {
                ModelAgent::new(model.clone(), Arc::clone(&client))
                    .with_system_prompt(system_prompt)
                    .with_rng_seed(rng.gen())
            })
            .collect();

        let mut room = Self::new(
            agents,
            settings.initial_prompts.clone(),
            settings.max_context,
            settings.max_iterations,
            checker,
        )?;
        room.rng = rng;
        Ok(room)
    }

    /// Make agent choice deterministic.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn agents(&self) -> &[ModelAgent] {
        &self.agents
    }

    pub fn chat_history(&self) -> &[Message] {
        &self.chat_history
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn checker(&self) -> &ConvergenceChecker {
        &self.checker
    }

    /// Start a pass over the room: seeds first, then fresh turns.
    pub fn generate_messages(&mut self) -> MessageStream<'_> {
        MessageStream {
            room: self,
            state: StreamState::NotStarted,
            produced: 0,
            stop_reason: None,
        }
    }

    /// Drain a full pass, logging progress. Returns how many messages the agents produced.
    pub async fn run(&mut self) -> Result<usize, RoomError> {
        let max_iterations = self.max_iterations;
        let mut stream = self.generate_messages();
        while let Some(message) = stream.next().await? {
            if !message.is_given() {
                log::info!(
                    "[{}/{}] {} ({} chars)",
                    stream.produced(),
                    max_iterations,
                    message.model,
                    message.content.chars().count()
                );
            }
        }
        Ok(stream.produced())
    }

    /// Snapshot of the configuration and history in log form.
    pub fn to_log(&self) -> RoomLog {
        RoomLog {
            config: RoomLogConfig {
                max_iterations: self.max_iterations,
                max_memory: self.max_memory,
                models: self.agents.iter().map(|a| a.name().to_string()).collect(),
                system_prompts: self
                    .agents
                    .iter()
                    .map(|a| a.system_prompt().to_string())
                    .collect(),
            },
            chat_history: self.chat_history.clone(),
        }
    }

    /// Save the configuration of the chatroom, including its history, to a JSON file in `dir`.
    ///
    /// The directory is created if needed. Returns the path written.
    pub fn to_disk(&self, dir: impl AsRef<Path>) -> Result<PathBuf, RoomError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(RoomLog::file_name(chrono::Local::now()));
        log::info!("Saving chatroom to {}", path.display());

        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(writer, &self.to_log())?;
        Ok(path)
    }

    fn context_window(&self) -> Vec<String> {
        let start = self.chat_history.len().saturating_sub(self.max_memory);
        self.chat_history[start..]
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    async fn emit(&self, event: RoomEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_room_event(&event).await;
        }
    }
}

enum StreamState {
    NotStarted,
    /// Index of the next history entry to re-yield.
    Replaying(usize),
    Turns,
    Done,
}

/// One-shot, forward-only cursor over a [`Room`] run.
///
/// Obtained from [`Room::generate_messages`]. Each call to [`next`](MessageStream::next) either
/// yields the next message or reports the end of the run with `Ok(None)`. Errors end the
/// run as well; later calls return `Ok(None)`.
pub struct MessageStream<'a> {
    room: &'a mut Room,
    state: StreamState,
    produced: usize,
    stop_reason: Option<StopReason>,
}

impl<'a> MessageStream<'a> {
    /// Messages produced by agents so far in this pass.
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// Why the run ended, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// The room's history as of now.
    pub fn chat_history(&self) -> &[Message] {
        &self.room.chat_history
    }

    /// Advance the run by one message.
    pub async fn next(&mut self) -> Result<Option<Message>, RoomError> {
        loop {
            match self.state {
                StreamState::NotStarted => {
                    self.room
                        .emit(RoomEvent::RunStarted {
                            models: self.room.agents.iter().map(|a| a.name().to_string()).collect(),
                            seed_messages: self.room.chat_history.len(),
                            max_iterations: self.room.max_iterations,
                        })
                        .await;
                    self.state = StreamState::Replaying(0);
                }
                StreamState::Replaying(index) => {
                    if let Some(message) = self.room.chat_history.get(index) {
                        self.state = StreamState::Replaying(index + 1);
                        return Ok(Some(message.clone()));
                    }
                    self.state = StreamState::Turns;
                }
                StreamState::Turns => return self.turn().await,
                StreamState::Done => return Ok(None),
            }
        }
    }

    async fn turn(&mut self) -> Result<Option<Message>, RoomError> {
        if self.produced >= self.room.max_iterations {
            self.finish(StopReason::IterationLimit).await;
            return Ok(None);
        }

        let step_distance = match self.room.checker.converged_step(&self.room.chat_history).await {
            Ok(step) => step,
            Err(err) => {
                self.finish(StopReason::Failed).await;
                return Err(RoomError::Convergence(err));
            }
        };
        self.room
            .emit(RoomEvent::ConvergenceChecked {
                history_len: self.room.chat_history.len(),
                step_distance,
            })
            .await;
        if let Some(step_distance) = step_distance {
            self.finish(StopReason::Converged { step_distance }).await;
            return Ok(None);
        }

        let iteration = self.produced + 1;
        let index = self.room.rng.gen_range(0..self.room.agents.len());
        let context = self.room.context_window();
        let agent = &self.room.agents[index];
        self.room
            .emit(RoomEvent::AgentSelected {
                iteration,
                model: agent.name().to_string(),
                context_len: context.len(),
            })
            .await;

        let message = match agent.generate(&context).await {
            Ok(message) => message,
            Err(source) => {
                let agent = agent.name().to_string();
                self.finish(StopReason::Failed).await;
                return Err(RoomError::Agent { agent, source });
            }
        };

        self.room.chat_history.push(message.clone());
        self.produced = iteration;
        self.room
            .emit(RoomEvent::MessageProduced {
                iteration,
                model: message.model.clone(),
                seed: message.seed,
                response_length: message.content.chars().count(),
            })
            .await;
        Ok(Some(message))
    }

    async fn finish(&mut self, reason: StopReason) {
        self.state = StreamState::Done;
        self.stop_reason = Some(reason);
        self.room
            .emit(RoomEvent::RunCompleted {
                reason,
                produced: self.produced,
                history_len: self.room.chat_history.len(),
            })
            .await;
    }
}
