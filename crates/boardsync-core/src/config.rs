//! Centralized Configuration Management
//!
//! All tunables of the synchronization core live here so the CLI can load
//! them from a single TOML file and tests can pick a preset.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Latency Configuration
// ----------------------------------------------------------------------------

/// Configuration for clock reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Half-ping above which an adjustment is logged as anomalous
    pub sanity_threshold_ms: u64,
    /// Half-ping assumed before any round trip has been measured
    pub default_half_ping_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            sanity_threshold_ms: 2_500,
            default_half_ping_ms: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Navigation Configuration
// ----------------------------------------------------------------------------

/// Configuration for rewind/forward navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// How long a button is held before it starts repeating
    pub hold_delay_ms: u64,
    /// Interval between repeats while held
    pub repeat_interval_ms: u64,
    /// Steps are never taken faster than this
    pub min_step_interval_ms: u64,
    /// How long rewinding stays locked after an opponent's move arrives
    pub rewind_lock_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            hold_delay_ms: 250,
            repeat_interval_ms: 40,
            min_step_interval_ms: 20,
            rewind_lock_ms: 750,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Configuration for the online session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Our account id, used to find our role in logged games
    pub user_id: Option<u64>,
    /// Plies needed before leaving resigns instead of aborting
    pub plies_to_resign: usize,
    /// Plies that must pass before we may offer a draw again
    pub min_plies_between_draw_offers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            plies_to_resign: 2,
            min_plies_between_draw_offers: 2,
        }
    }
}

// ----------------------------------------------------------------------------
// Storage Configuration
// ----------------------------------------------------------------------------

/// Configuration for the variant cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the JSON variant cache; in-memory when unset
    pub cache_dir: Option<PathBuf>,
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub latency: LatencyConfig,
    pub navigation: NavigationConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
}

impl ClientConfig {
    /// Configuration for deterministic tests: no throttling, no default ping
    pub fn testing() -> Self {
        Self {
            navigation: NavigationConfig {
                min_step_interval_ms: 0,
                ..NavigationConfig::default()
            },
            ..Self::default()
        }
    }

    /// Set our account id
    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.session.user_id = Some(user_id);
        self
    }

    /// Set the assumed half-ping
    pub fn with_default_half_ping(mut self, millis: u64) -> Self {
        self.latency.default_half_ping_ms = millis;
        self
    }

    /// Reject configurations the core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.navigation.repeat_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "navigation.repeat_interval_ms must be positive".to_string(),
            });
        }
        if self.navigation.repeat_interval_ms < self.navigation.min_step_interval_ms {
            return Err(ConfigError::Invalid {
                reason: "navigation.repeat_interval_ms is below min_step_interval_ms".to_string(),
            });
        }
        if self.session.plies_to_resign == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.plies_to_resign must be positive".to_string(),
            });
        }
        Ok(())
    }
}
