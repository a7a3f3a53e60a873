//! BoardSync CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing::info;

use boardsync_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;
    CommandDispatcher::execute(cli, config).await
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults, then apply flag overrides
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            AppConfig::load_from_file(path)?
        }
        None => {
            info!("Using default configuration");
            AppConfig::default()
        }
    };

    if let Some(user_id) = cli.user_id {
        config.client.session.user_id = Some(user_id);
    }
    if let Some(dir) = &cli.cache_dir {
        config.client.storage.cache_dir = Some(dir.clone());
    }
    if cli.persistent_cache && config.client.storage.cache_dir.is_none() {
        config.client.storage.cache_dir = Some(AppConfig::default_cache_dir()?);
    }
    config.validate()?;
    Ok(config)
}
