//! Error types for the board synchronization core
//!
//! This module contains all error types used throughout the core, including
//! board invariant violations, protocol anomalies, session misuse, and the
//! main SyncError type that unifies them all.

use crate::types::Coords;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Board invariant violations
///
/// Any of these means the local board has already diverged from what the
/// caller believed it to be. They abort the operation that raised them and
/// are never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("No piece exists at {coords}")]
    NoPieceAt { coords: Coords },
    #[error("Square {coords} is already occupied")]
    SquareOccupied { coords: Coords },
    #[error("Piece index {index} is already in use")]
    IndexInUse { index: usize },
    #[error("Piece index {index} does not hold a piece at {coords}")]
    IndexMismatch { index: usize, coords: Coords },
    #[error("Cannot {operation}: move cursor at {move_index} of {move_count}")]
    MoveCursor {
        operation: &'static str,
        move_index: usize,
        move_count: usize,
    },
}

/// Protocol anomalies received from the server
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown action \"{action}\" received in '{sub}' route")]
    UnknownAction { sub: String, action: String },
    #[error("Malformed payload for action \"{action}\": {reason}")]
    MalformedPayload { action: String, reason: String },
    #[error("Invalid compact move \"{compact}\": {reason}")]
    InvalidCompactMove { compact: String, reason: String },
    #[error("Invalid piece abbreviation \"{abbreviation}\"")]
    UnknownPieceAbbreviation { abbreviation: String },
    #[error("Invalid game record: {reason}")]
    InvalidGameRecord { reason: String },
}

/// Misuse of the online session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Not in an online game")]
    NotInOnlineGame,
    #[error("Out of sync with the server, move for game {game_id} was held")]
    OutOfSync { game_id: u32 },
    #[error("It is not our turn")]
    NotOurTurn,
    #[error("The game is already over")]
    GameOver,
    #[error("No game is loaded")]
    NoGameLoaded,
}

/// Errors that can occur during session state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on event {event}: {reason}")]
    InvalidTransition {
        from_state: String,
        event: String,
        reason: String,
    },
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for board synchronization
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Board invariant violated: {0}")]
    Board(#[from] BoardError),

    #[error("Protocol anomaly: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Variant cache failure
    #[error("Storage error: {reason}")]
    Storage { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl SyncError {
    /// Create a malformed payload error
    pub fn malformed<A: Into<String>, R: Into<String>>(action: A, reason: R) -> Self {
        SyncError::Protocol(ProtocolError::MalformedPayload {
            action: action.into(),
            reason: reason.into(),
        })
    }

    /// Create an invalid compact move error
    pub fn invalid_move<C: Into<String>, R: Into<String>>(compact: C, reason: R) -> Self {
        SyncError::Protocol(ProtocolError::InvalidCompactMove {
            compact: compact.into(),
            reason: reason.into(),
        })
    }

    /// Create an invalid game record error
    pub fn invalid_record<R: Into<String>>(reason: R) -> Self {
        SyncError::Protocol(ProtocolError::InvalidGameRecord {
            reason: reason.into(),
        })
    }

    /// Create a storage error
    pub fn storage<R: Into<String>>(reason: R) -> Self {
        SyncError::Storage {
            reason: reason.into(),
        }
    }

    /// Whether this error means the local board can no longer be trusted
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SyncError::Board(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, SyncError>;
pub type SyncResult<T> = Result<T>;
