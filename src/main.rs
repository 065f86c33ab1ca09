use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use quineroom::clients::{init_client, ClientConfig};
use quineroom::{EmbeddingClient, LoggingEventHandler, MetricKind, Room, RoomError, RoomSettings};

#[derive(Parser, Debug)]
#[command(
    name = "quineroom",
    about = "Let language models chat until the conversation repeats itself",
    version
)]
struct Cli {
    /// Models taking part in the chatroom
    #[arg(short, long, num_args = 1.., required = true)]
    models: Vec<String>,

    /// Prompts seeding the chat history
    #[arg(short, long, num_args = 0.., default_value = "Hello!")]
    initial_prompts: Vec<String>,

    /// System prompts, one per model or a single one for all
    #[arg(short, long, num_args = 0.., default_value = "")]
    system_prompts: Vec<String>,

    /// Number of trailing messages each model sees
    #[arg(short = 'c', long, default_value_t = 10)]
    max_context: usize,

    /// Number of matching messages that make a quine
    #[arg(short = 'q', long, default_value_t = 3)]
    min_quine_length: usize,

    /// Seed for reproducible runs
    #[arg(short = 'r', long)]
    seed: Option<u64>,

    /// Maximum number of generated messages
    #[arg(long, default_value_t = 100)]
    max_iterations: usize,

    /// Whether to save the chatroom to disk
    #[arg(long)]
    save: bool,

    /// Similarity metric used to detect a quine
    #[arg(long, value_enum, default_value_t = MetricKind::Fuzzy)]
    metric: MetricKind,

    /// Similarity threshold (0-1 for jaro/cosine, 0-100 for fuzzy)
    #[arg(long, default_value_t = 99.0)]
    threshold: f64,

    /// Largest message period scanned for repetition
    #[arg(long, default_value_t = 5)]
    max_step_distance: usize,

    /// Embedding model, required by the cosine metric
    #[arg(long)]
    embedding_model: Option<String>,

    /// Directory receiving saved chatrooms
    #[arg(long, default_value = "./log2/")]
    log_dir: PathBuf,

    /// Env file holding the backend credentials
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

impl Cli {
    fn settings(&self) -> RoomSettings {
        RoomSettings {
            models: self.models.clone(),
            initial_prompts: self.initial_prompts.clone(),
            system_prompts: self.system_prompts.clone(),
            max_context: self.max_context,
            min_quine_length: self.min_quine_length,
            max_step_distance: self.max_step_distance,
            metric: self.metric,
            threshold: self.threshold,
            embedding_model: self.embedding_model.clone(),
            seed: self.seed,
            max_iterations: self.max_iterations,
            log_dir: self.log_dir.clone(),
        }
    }
}

async fn run_and_save(room: &mut Room, dir: &Path) -> Result<PathBuf, RoomError> {
    let produced = room.run().await?;
    log::info!("Chatroom produced {} message(s)", produced);
    room.to_disk(dir)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = cli.settings();
    settings.validate()?;

    let client = init_client(ClientConfig::from_env_file(&cli.env_file)?)?;
    let embedder: Arc<dyn EmbeddingClient> = client.clone();
    let mut room = Room::from_settings(&settings, client, Some(embedder))?
        .with_event_handler(Arc::new(LoggingEventHandler));

    if cli.save {
        return match run_and_save(&mut room, &settings.log_dir).await {
            Ok(path) => {
                println!("Saved chatroom to {}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                println!("An error occurred while running the chatroom. {}", e);
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let mut stream = room.generate_messages();
    while let Some(message) = stream.next().await? {
        println!("{}", message.render());
    }
    Ok(ExitCode::SUCCESS)
}
