//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Our account id, used to find our side in logged games
    #[arg(short, long)]
    pub user_id: Option<u64>,

    /// Directory for the variant cache
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Keep the variant cache in the user cache directory
    #[arg(long)]
    pub persistent_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines transcript of driver inputs
    Replay {
        /// Transcript file, one input per line
        transcript: PathBuf,
        /// Print only the final board
        #[arg(short, long)]
        quiet: bool,
    },
    /// Load a finished game record and print its final position
    Inspect {
        /// Game record file
        record: PathBuf,
        /// Game id to load it under
        #[arg(long, default_value_t = 1)]
        game_id: u32,
    },
    /// Print the effective configuration as TOML
    Config,
}
