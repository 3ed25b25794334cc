//! canoncheck command-line front end.
//!
//! ```bash
//! canoncheck check --story novel.txt --backstory hero.txt
//! canoncheck batch --story novel.txt --input backstories.jsonl --out results.jsonl
//! ```
//!
//! Requires `ANTHROPIC_API_KEY` (read from `.env` if present).

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Check whether a backstory is consistent with a story.
#[derive(Parser)]
#[command(name = "canoncheck", version, about)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse one backstory against a story
    Check(CheckArgs),
    /// Analyse every backstory of a JSON Lines file against one story
    Batch(BatchArgs),
}

/// Retrieval and chunking settings shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct TuningArgs {
    /// Passages retrieved per claim
    #[arg(long)]
    pub k: Option<usize>,

    /// Semantic weight in [0, 1]
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Words per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Words shared by consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Claims evaluated at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep index and response caches in memory only
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Story text file
    #[arg(long)]
    pub story: Option<PathBuf>,

    /// Backstory text file
    #[arg(long)]
    pub backstory: Option<PathBuf>,

    /// Print the analysis as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON analysis to this file
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Story text file
    #[arg(long)]
    pub story: PathBuf,

    /// JSON Lines file of {"id", "backstory"} objects
    #[arg(long)]
    pub input: PathBuf,

    /// Write one JSON record per backstory to this file
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Check(args) => commands::check(args).await,
        Command::Batch(args) => commands::batch(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
