//! Configuration for QuineRoom.
//!
//! Two pieces of configuration exist:
//!
//! - [`ClientConfig`]: where the OpenAI-compatible backend lives and how to authenticate,
//!   read from a `.env` file (process environment variables fill in missing keys).
//! - [`RoomSettings`]: every knob of a chatroom run. The binary fills it from the command line;
//!   library users construct it however they want.
//!
//! Both are validated before any agent is called, so a bad configuration never produces a
//! partial run.
//!
//! # Example
//!
//! ```rust
//! use quineroom::config::RoomSettings;
//!
//! let settings = RoomSettings {
//!     models: vec!["a".into(), "b".into()],
//!     system_prompts: vec!["You only ever say LOL.".into()],
//!     ..RoomSettings::default()
//! };
//! // A single system prompt is broadcast to every model.
//! assert_eq!(settings.resolve_system_prompts().unwrap().len(), 2);
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Key used when only basic-auth credentials are configured.
pub const DUMMY_API_KEY: &str = "sk-dummykey";

/// Bounded wait applied to every chat and embedding request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration problems, all detected before a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `min_len` must be at least 2: a single message cannot repeat.
    InvalidMinLength(usize),
    /// `max_step_distance` must be at least 1.
    InvalidStepDistance(usize),
    /// The context window must expose at least one message.
    InvalidContextWindow(usize),
    /// A room needs at least one agent.
    NoAgents,
    /// System prompts must be a single broadcast value or one per model.
    SystemPromptMismatch { models: usize, prompts: usize },
    /// The cosine metric was selected without naming an embedding model.
    MissingEmbeddingModel,
    /// A required key is absent from both the `.env` file and the environment.
    MissingEnv(String),
    /// The `.env` file could not be read or parsed.
    EnvFile(String),
    /// The process-wide client was initialised twice.
    ClientAlreadyInitialized,
    /// The HTTP transport for the backend could not be built.
    Transport(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidMinLength(n) => {
                write!(f, "Minimum quine length must be at least 2, got {}", n)
            }
            ConfigError::InvalidStepDistance(n) => {
                write!(f, "Maximum step distance must be at least 1, got {}", n)
            }
            ConfigError::InvalidContextWindow(n) => {
                write!(f, "Context window must be at least 1, got {}", n)
            }
            ConfigError::NoAgents => write!(f, "At least one model is required"),
            ConfigError::SystemPromptMismatch { models, prompts } => write!(
                f,
                "The number of system prompts must match the number of models ({} prompts for {} models)",
                prompts, models
            ),
            ConfigError::MissingEmbeddingModel => {
                write!(f, "The cosine metric requires an embedding model")
            }
            ConfigError::MissingEnv(key) => write!(f, "Please set the {} environment variable", key),
            ConfigError::EnvFile(msg) => write!(f, "Could not read env file: {}", msg),
            ConfigError::ClientAlreadyInitialized => {
                write!(f, "The backend client has already been initialised")
            }
            ConfigError::Transport(msg) => write!(f, "Could not build HTTP transport: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Connection settings for the OpenAI-compatible backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`.
    pub api_url: String,
    /// Bearer key. Defaults to [`DUMMY_API_KEY`] when basic auth is used instead.
    pub api_key: String,
    /// `(username, password)` for HTTP basic auth.
    pub basic_auth: Option<(String, String)>,
    /// Bounded wait per request.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Load the configuration from a dotenv file.
    ///
    /// The file must exist. Keys missing from it are looked up in the process environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let iter = dotenvy::from_filename_iter(path).map_err(|e| {
            if e.not_found() {
                ConfigError::EnvFile(format!(
                    "no {} file found, please create one with OPENAI_API_URL and \
                     (OPENAI_API_KEY or OPENAI_API_USERNAME and OPENAI_API_PASSWORD)",
                    path.display()
                ))
            } else {
                ConfigError::EnvFile(e.to_string())
            }
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::EnvFile(e.to_string()))?;
            values.insert(key, value);
        }
        for key in [
            "OPENAI_API_URL",
            "OPENAI_API_KEY",
            "OPENAI_API_USERNAME",
            "OPENAI_API_PASSWORD",
        ] {
            if !values.contains_key(key) {
                if let Ok(value) = std::env::var(key) {
                    values.insert(key.to_string(), value);
                }
            }
        }
        Self::from_values(&values)
    }

    /// Build the configuration from already-collected key/value pairs.
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_url = values
            .get("OPENAI_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("OPENAI_API_URL".into()))?;

        let basic_auth = match (
            values.get("OPENAI_API_USERNAME"),
            values.get("OPENAI_API_PASSWORD"),
        ) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        let api_key = match values.get("OPENAI_API_KEY") {
            Some(key) => key.clone(),
            None if basic_auth.is_some() => DUMMY_API_KEY.to_string(),
            None => return Err(ConfigError::MissingEnv("OPENAI_API_KEY".into())),
        };

        Ok(Self {
            api_url,
            api_key,
            basic_auth,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The closed set of similarity metrics selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MetricKind {
    Equality,
    Cosine,
    Jaro,
    Fuzzy,
}

/// Every knob of a chatroom run.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSettings {
    /// Backend model names, one agent per entry.
    pub models: Vec<String>,
    /// Prompts seeding the chat history, in order.
    pub initial_prompts: Vec<String>,
    /// One system prompt per model, or a single prompt broadcast to all.
    pub system_prompts: Vec<String>,
    /// How many trailing messages an agent sees.
    pub max_context: usize,
    /// How many stride-sampled messages must agree before the room stops.
    pub min_quine_length: usize,
    /// Largest stride scanned by the convergence checker.
    pub max_step_distance: usize,
    pub metric: MetricKind,
    /// Threshold for the threshold metrics (0-1 for jaro/cosine, 0-100 for fuzzy).
    pub threshold: f64,
    /// Embedding model used by the cosine metric.
    pub embedding_model: Option<String>,
    /// Seeds the room's RNG (agent choice and per-call seeds).
    pub seed: Option<u64>,
    pub max_iterations: usize,
    /// Directory for JSON chatroom logs.
    pub log_dir: PathBuf,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            initial_prompts: vec!["Hello!".to_string()],
            system_prompts: vec![String::new()],
            max_context: 10,
            min_quine_length: 3,
            max_step_distance: 5,
            metric: MetricKind::Fuzzy,
            threshold: 99.0,
            embedding_model: None,
            seed: None,
            max_iterations: 100,
            log_dir: PathBuf::from("./log2/"),
        }
    }
}

impl RoomSettings {
    /// Apply the broadcast rule: a single system prompt is used for every model, otherwise the
    /// counts must match. An empty list is a mismatch; pass a single empty prompt for none.
    pub fn resolve_system_prompts(&self) -> Result<Vec<String>, ConfigError> {
        match self.system_prompts.len() {
            1 => Ok(vec![self.system_prompts[0].clone(); self.models.len()]),
            n if n == self.models.len() => Ok(self.system_prompts.clone()),
            n => Err(ConfigError::SystemPromptMismatch {
                models: self.models.len(),
                prompts: n,
            }),
        }
    }

    /// Check every invariant that does not need a backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        if self.min_quine_length < 2 {
            return Err(ConfigError::InvalidMinLength(self.min_quine_length));
        }
        if self.max_step_distance < 1 {
            return Err(ConfigError::InvalidStepDistance(self.max_step_distance));
        }
        if self.max_context < 1 {
            return Err(ConfigError::InvalidContextWindow(self.max_context));
        }
        if self.metric == MetricKind::Cosine && self.embedding_model.is_none() {
            return Err(ConfigError::MissingEmbeddingModel);
        }
        self.resolve_system_prompts().map(|_| ())
    }
}
