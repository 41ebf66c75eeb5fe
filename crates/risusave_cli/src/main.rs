//! RisuSave CLI
//!
//! Command-line tools for RisuSave save files.
//!
//! # Commands
//!
//! - `inspect` - Show the container format and a snapshot summary
//! - `hash` - Print the structural hash of a save file or JSON document
//! - `convert` - Re-encode a save file into another format
//! - `diff` - Print the patch between two save files

mod commands;

use clap::{Parser, Subcommand};
use commands::convert::Target;
use commands::hash::HashInput;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RisuSave command-line save file tools.
#[derive(Parser)]
#[command(name = "risusave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the container format and a snapshot summary
    Inspect {
        /// Save file to inspect
        path: PathBuf,

        /// List top-level keys
        #[arg(short, long)]
        keys: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the structural hash of a snapshot
    Hash {
        /// Save file (or JSON file with --json)
        path: PathBuf,

        /// Read the input as JSON text
        #[arg(short, long)]
        json: bool,
    },

    /// Re-encode a save file
    Convert {
        /// Input save file, any supported format
        input: PathBuf,

        /// Output file
        output: PathBuf,

        /// Output format (raw, block, stream, json)
        #[arg(short, long, default_value = "stream")]
        format: String,
    },

    /// Print the patch that turns one save file into another
    Diff {
        /// Base save file
        old: PathBuf,

        /// Changed save file
        new: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { path, keys, format } => {
            commands::inspect::run(&path, keys, &format)?;
        }
        Commands::Hash { path, json } => {
            let input = if json {
                HashInput::Json
            } else {
                HashInput::Container
            };
            commands::hash::run(&path, input)?;
        }
        Commands::Convert {
            input,
            output,
            format,
        } => {
            let target = Target::parse(&format)?;
            commands::convert::run(&input, &output, target)?;
        }
        Commands::Diff { old, new, format } => {
            commands::diff::run(&old, &new, &format)?;
        }
        Commands::Version => {
            println!("RisuSave CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Container formats: raw (v{}), block (v{}), stream (v{})",
                risusave_codec::ContainerFormat::Raw.version(),
                risusave_codec::ContainerFormat::BlockCompressed.version(),
                risusave_codec::ContainerFormat::StreamCompressed.version()
            );
        }
    }

    Ok(())
}
