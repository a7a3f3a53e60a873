//! BoardSync CLI library
//!
//! Command definitions, TOML configuration and the transcript replay used by
//! the `boardsync` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod replay;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use replay::{read_transcript, run_replay, ReplayReport};
