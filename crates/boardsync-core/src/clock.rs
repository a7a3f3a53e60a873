//! Clock reconciliation
//!
//! Server clock payloads are already stale by the time they arrive. The
//! ticking player's time is reduced by half the measured round trip and the
//! absolute instant they lose on time is stamped so later reads can derive
//! the displayed remaining time from the local clock.

use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::config::LatencyConfig;
use crate::types::{Player, Timestamp};

// ----------------------------------------------------------------------------
// Clock Values
// ----------------------------------------------------------------------------

/// Milliseconds remaining per player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerClocks {
    pub white: i64,
    pub black: i64,
}

impl PlayerClocks {
    pub fn get(&self, player: Player) -> i64 {
        match player {
            Player::White => self.white,
            Player::Black => self.black,
        }
    }

    pub fn get_mut(&mut self, player: Player) -> &mut i64 {
        match player {
            Player::White => &mut self.white,
            Player::Black => &mut self.black,
        }
    }
}

/// Clock payload as sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockValues {
    pub clocks: PlayerClocks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_ticking: Option<Player>,
    /// Epoch milliseconds at which the ticking player runs out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_color_ticking_loses_at: Option<u64>,
}

impl ClockValues {
    pub fn new(white: i64, black: i64) -> Self {
        Self {
            clocks: PlayerClocks { white, black },
            color_ticking: None,
            time_color_ticking_loses_at: None,
        }
    }

    pub fn ticking(mut self, player: Player) -> Self {
        self.color_ticking = Some(player);
        self
    }

    /// Displayed remaining time of `player` at `now`
    pub fn remaining(&self, player: Player, now: Timestamp) -> i64 {
        match (self.color_ticking, self.time_color_ticking_loses_at) {
            (Some(ticking), Some(loses_at)) if ticking == player => {
                (loses_at as i64 - now.as_millis() as i64).max(0)
            }
            _ => self.clocks.get(player),
        }
    }

    /// Stop the ticking clock at `now`, keeping the remaining time
    pub fn freeze(&mut self, now: Timestamp) {
        if let Some(ticking) = self.color_ticking {
            *self.clocks.get_mut(ticking) = self.remaining(ticking, now);
        }
        self.color_ticking = None;
        self.time_color_ticking_loses_at = None;
    }
}

// ----------------------------------------------------------------------------
// Reconciliation
// ----------------------------------------------------------------------------

/// Adjust server clock values for one-way latency
///
/// Passes the values through untouched when no clock is ticking. A half-ping
/// above `sanity_threshold_ms` is logged but still applied.
pub fn adjust_clock_values_for_ping(
    mut values: ClockValues,
    half_ping_ms: u64,
    sanity_threshold_ms: u64,
    now: Timestamp,
) -> ClockValues {
    let Some(ticking) = values.color_ticking else {
        return values;
    };
    if half_ping_ms > sanity_threshold_ms {
        error!(
            half_ping_ms,
            "Ping is above {} milliseconds, clock adjustment is large",
            sanity_threshold_ms * 2
        );
    }

    let clock = values.clocks.get_mut(ticking);
    *clock -= half_ping_ms as i64;
    let remaining = *clock;
    values.time_color_ticking_loses_at = Some(now.offset_by(remaining).as_millis());
    trace!(%ticking, half_ping_ms, remaining, "Clock adjusted for ping");
    values
}

// ----------------------------------------------------------------------------
// Latency Tracker
// ----------------------------------------------------------------------------

/// Tracks measured round trips and reports the current half-ping
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    config: LatencyConfig,
    last_round_trip_ms: Option<u64>,
    samples: u64,
}

impl LatencyTracker {
    pub fn new(config: LatencyConfig) -> Self {
        Self {
            config,
            last_round_trip_ms: None,
            samples: 0,
        }
    }

    /// Record a measured round trip
    pub fn record_round_trip(&mut self, millis: u64) {
        self.last_round_trip_ms = Some(millis);
        self.samples += 1;
    }

    /// Half of the latest round trip, or the configured default
    pub fn half_ping(&self) -> u64 {
        self.last_round_trip_ms
            .map(|rtt| rtt / 2)
            .unwrap_or(self.config.default_half_ping_ms)
    }

    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// Reconcile a clock payload with the current half-ping
    pub fn adjust(&self, values: ClockValues, now: Timestamp) -> ClockValues {
        adjust_clock_values_for_ping(
            values,
            self.half_ping(),
            self.config.sanity_threshold_ms,
            now,
        )
    }

    /// Reduce a server-relative duration by the current half-ping
    pub fn adjust_duration(&self, millis: u64) -> u64 {
        millis.saturating_sub(self.half_ping())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
