//! Command execution

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use boardsync_core::ServerMessage;
use boardsync_runtime::DriverInput;

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, OutputConfig};
use crate::replay::{read_transcript, render_report, run_replay};

pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Replay { transcript, quiet } => {
                let output = if quiet {
                    OutputConfig {
                        show_effects: false,
                        show_events: false,
                        show_audit: false,
                    }
                } else {
                    config.output.clone()
                };
                Self::replay(&transcript, &config, &output).await
            }
            Commands::Inspect { record, game_id } => Self::inspect(&record, game_id, &config).await,
            Commands::Config => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        }
    }

    async fn replay(path: &Path, config: &AppConfig, output: &OutputConfig) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let inputs = read_transcript(BufReader::new(file))?;
        info!(inputs = inputs.len(), "Replaying {}", path.display());

        let report = run_replay(&config.client, inputs).await?;
        print!("{}", render_report(&report, output)?);
        Ok(())
    }

    /// Load a record the way the server delivers a finished game
    async fn inspect(path: &Path, game_id: u32, config: &AppConfig) -> Result<()> {
        let icn = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let message = ServerMessage::game(
            "logged-game-info",
            json!({ "game_id": game_id, "icn": icn.trim() }),
        );

        let report = run_replay(&config.client, vec![DriverInput::Server { message }]).await?;
        let output = OutputConfig {
            show_effects: false,
            ..config.output.clone()
        };
        print!("{}", render_report(&report, &output)?);
        Ok(())
    }
}
