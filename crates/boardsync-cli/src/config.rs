//! BoardSync CLI Configuration Management
//!
//! A single TOML file holds the core [`ClientConfig`] under `[client]`
//! plus what the CLI prints under `[output]`. Missing keys take defaults,
//! and command-line flags override the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use boardsync_core::ClientConfig;

/// What the replay prints besides the final board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub show_effects: bool,
    pub show_events: bool,
    /// Print the session audit trail
    pub show_audit: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_effects: true,
            show_events: true,
            show_audit: false,
        }
    }
}

/// Complete configuration for the CLI application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.client
            .validate()
            .map_err(|e| anyhow!("Invalid configuration: {}", e))
    }

    /// `<user cache dir>/boardsync/variants`
    pub fn default_cache_dir() -> Result<PathBuf> {
        let base = dirs::cache_dir().ok_or_else(|| anyhow!("No user cache directory available"))?;
        Ok(base.join("boardsync").join("variants"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [client.session]
            user_id = 73

            [client.navigation]
            rewind_lock_ms = 1000

            [output]
            show_audit = true
            "#,
        )
        .unwrap();

        assert_eq!(config.client.session.user_id, Some(73));
        assert_eq!(config.client.session.plies_to_resign, 2);
        assert_eq!(config.client.navigation.rewind_lock_ms, 1000);
        assert_eq!(config.client.navigation.hold_delay_ms, 250);
        assert!(config.output.show_audit);
        assert!(config.output.show_effects);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [client.session]
            plies_to_resign = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.client.storage.cache_dir = Some(PathBuf::from("/tmp/boardsync"));
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }
}
