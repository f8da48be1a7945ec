//! Image history command line tools.
//!
//! Provides the `imagehistory` binary for inspecting and normalizing
//! serialized image histories and for analysing the derived-from graph built
//! from histories, relation lists or a catalog snapshot. Every subcommand
//! prints JSON to stdout.
//!
//! Logging goes to stderr and is filtered by `IMAGEHISTORY_LOG` (default
//! `warn`).

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use imagehistory_catalog::ImageRowId;

use crate::error::CliError;

/// Image history inspection and provenance graph tools.
#[derive(Parser)]
#[command(name = "imagehistory", about = "Image history inspection and provenance graph tools")]
struct Cli {
    /// Graph settings as a JSON file (default: built-in settings).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Summarize a history file.
    Inspect {
        /// Path to the history file.
        file: PathBuf,
    },

    /// Re-encode a history file in canonical form.
    Normalize {
        /// Path to the history file.
        file: PathBuf,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyse a list of `[child, parent]` row relations.
    Graph {
        /// Path to a JSON array of `[child, parent]` row pairs.
        relations: PathBuf,

        /// Row whose longest ancestry line is reported.
        #[arg(long)]
        vertex: Option<i64>,
    },

    /// Merge history files into one graph.
    Ingest {
        /// Paths to the history files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Build the graph around a stored image of a catalog snapshot.
    Display {
        /// Path to the catalog snapshot.
        #[arg(long)]
        catalog: PathBuf,

        /// Row of the image.
        #[arg(long)]
        row: i64,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    process::exit(run(cli));
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("IMAGEHISTORY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute a subcommand.
///
/// Returns exit code: 0 = success, 1 = invalid input, 3 = I/O error.
fn run(cli: Cli) -> i32 {
    match execute(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn execute(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Inspect { file } => print_json(&commands::inspect(&file)?),
        Commands::Normalize { file, output } => {
            if let Some(text) = commands::normalize(&file, output.as_deref())? {
                println!("{}", text);
            }
        }
        Commands::Graph { relations, vertex } => {
            let config = commands::load_config(config_path)?;
            let report = commands::relations(&relations, vertex.map(ImageRowId), &config)?;
            print_json(&report);
        }
        Commands::Ingest { files } => {
            let config = commands::load_config(config_path)?;
            print_json(&commands::ingest(&files, &config)?);
        }
        Commands::Display { catalog, row } => {
            let config = commands::load_config(config_path)?;
            print_json(&commands::display(&catalog, ImageRowId(row), &config)?);
        }
    }
    Ok(())
}

/// Print a report as JSON to stdout for machine-readable output.
fn print_json<T: Serialize>(report: &T) {
    let json = serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}
