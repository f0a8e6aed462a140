//! nbbang CLI
//!
//! Usage:
//!   nbbang process <images…>
//!   nbbang extract <lines.txt>
//!   nbbang normalize <lines.txt>
//!   nbbang dict <path>
//!   nbbang settle --receipts <report.json> --equal <names…>
//!   nbbang settle --assignments <items.json>

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "nbbang")]
#[command(about = "Read Korean receipts and split the bill")]
#[command(version)]
struct Cli {
    /// Pipeline configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full image pipeline on receipt photos and print a batch report
    Process {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[command(flatten)]
        dictionaries: DictionaryArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Normalize and extract items from already-recognised text, one line per row
    Extract {
        input: PathBuf,
        #[command(flatten)]
        dictionaries: DictionaryArgs,
    },
    /// Print the normalized form of recognised text
    Normalize {
        input: PathBuf,
        #[command(flatten)]
        dictionaries: DictionaryArgs,
    },
    /// Load a dictionary file and describe it
    Dict { path: PathBuf },
    /// Split receipt totals between participants
    Settle {
        /// Batch report or extraction results (JSON), for an equal split
        #[arg(long, requires = "equal", required_unless_present = "assignments")]
        receipts: Option<PathBuf>,
        /// Participants sharing the grand total equally
        #[arg(long, num_args = 1.., conflicts_with = "assignments")]
        equal: Vec<String>,
        /// Items with their participants (JSON), for an itemized split
        #[arg(long, required_unless_present = "equal")]
        assignments: Option<PathBuf>,
        /// Where floor-division leftovers go
        #[arg(long, value_enum, default_value_t = Remainder::Unallocated)]
        remainder: Remainder,
    },
}

#[derive(Args, Debug, Default)]
pub struct DictionaryArgs {
    /// Flat vocabulary for spelling correction (one term per line)
    #[arg(long)]
    pub vocabulary: Option<PathBuf>,
    /// Store menu dictionary (JSON)
    #[arg(long)]
    pub menu: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Tesseract data directory
    #[arg(long)]
    pub tessdata: Option<String>,
    /// Tesseract language
    #[arg(long, default_value = "kor")]
    pub lang: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Remainder {
    Unallocated,
    First,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Process { images, dictionaries, engine } => {
            let config = commands::load_config(config, &dictionaries)?;
            commands::process(&config, &images, &engine)
        }
        Commands::Extract { input, dictionaries } => {
            let config = commands::load_config(config, &dictionaries)?;
            commands::extract(&config, &input)
        }
        Commands::Normalize { input, dictionaries } => {
            let config = commands::load_config(config, &dictionaries)?;
            commands::normalize(&config, &input)
        }
        Commands::Dict { path } => commands::describe_dictionary(&path),
        Commands::Settle { receipts, equal, assignments, remainder } => {
            commands::settle(receipts.as_deref(), &equal, assignments.as_deref(), remainder)
        }
    }
}
