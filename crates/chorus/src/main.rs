//! Chorus CLI - threaded comment core.
//!
//! Provides commands for:
//! - `extract`: Extract mentions and tags from a serialized editor state
//! - `replay`: Fold a list of reducer actions into a comment state
//! - `threads`: Print a comment list grouped into threads
//! - `script`: Run a scripted comment session against in-memory storage
//! - `suggest`: Search configured mention candidates

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use chorus_config::{CliSettings, Config};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ExtractArgs, ReplayArgs, ScriptArgs, SuggestArgs, ThreadsArgs};
use error::CliError;
use output::Output;

/// Chorus - threaded comment core.
#[derive(Parser)]
#[command(name = "chorus", version, about)]
struct Cli {
    /// Path to configuration file (default: auto-discover chorus.toml).
    #[arg(short, long, global = true, env = "CHORUS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output (shows info-level logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Act as this user id (overrides `user.id`).
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// Act as this user name (overrides `user.name`).
    #[arg(long, global = true)]
    user_name: Option<String>,

    /// Maximum comment length (overrides `comments.max_length`).
    #[arg(long, global = true)]
    max_length: Option<usize>,

    /// Mention node type (overrides `mentions.node_type`).
    #[arg(long, global = true)]
    node_type: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract mentions and tags from a serialized editor state.
    Extract(ExtractArgs),
    /// Fold reducer actions into a comment state.
    Replay(ReplayArgs),
    /// Print comments grouped into threads.
    Threads(ThreadsArgs),
    /// Run a scripted session against in-memory storage.
    Script(ScriptArgs),
    /// Search configured mention candidates.
    Suggest(SuggestArgs),
}

impl Cli {
    fn settings(&self) -> CliSettings {
        CliSettings {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            max_length: self.max_length,
            node_type: self.node_type.clone(),
        }
    }

    fn run(self) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), Some(&self.settings()))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        match self.command {
            Commands::Extract(args) => args.execute(&config),
            Commands::Replay(args) => args.execute(),
            Commands::Threads(args) => args.execute(),
            Commands::Script(args) => args.execute(&config),
            Commands::Suggest(args) => args.execute(&config),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.run() {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
