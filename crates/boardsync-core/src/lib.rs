//! BoardSync Core
//!
//! Reversible board edits, undo/redo history and the session state machine
//! that keeps a client's board in agreement with an authoritative game
//! server. The crate performs no I/O: handlers return effects for a runtime
//! to execute and application events for a user interface.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod board;
pub mod cache;
pub mod change;
pub mod client;
pub mod clock;
pub mod config;
pub mod draw_offers;
pub mod editor;
pub mod effects;
pub mod errors;
pub mod history;
pub mod icn;
pub mod moves;
pub mod navigation;
pub mod position;
pub mod protocol;
pub mod router;
pub mod session;
pub mod timers;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use board::{BoardState, EnPassant, MoveRecord, Piece};
pub use cache::{variant_cache_key, MemoryVariantCache, StartingPiece, VariantCache, VariantOptions};
pub use change::{apply_edit, Change, Edit, EditState, StateChange};
pub use client::{GameClient, LoadedGame, TransportSignal, MAX_AUDIT_ENTRIES};
pub use clock::{adjust_clock_values_for_ping, ClockValues, LatencyTracker, PlayerClocks};
pub use config::{ClientConfig, LatencyConfig, NavigationConfig, SessionConfig, StorageConfig};
pub use draw_offers::DrawOffers;
pub use editor::{BoardEditor, EditorTool};
pub use effects::{AppEvent, Effect, HandlerOutput};
pub use errors::{
    BoardError, ConfigError, ProtocolError, Result, SessionError, StateTransitionError, SyncError,
    SyncResult,
};
pub use history::{EditHistory, OpenEdit, Selection};
pub use icn::{parse_game_record, GameRecord};
pub use moves::{generate_editor_move_edit, generate_move_edit, MoveDraft};
pub use navigation::{MoveNavigator, NavigationDirection};
pub use position::{ClassicalPositions, StartingPositionProvider};
pub use protocol::{Channel, GameRequest, InboundAction, OutboundMessage, ServerMessage};
pub use router::SyncRouter;
pub use session::{AuditEntry, OnlineGameInfo, OnlineSession, SessionEvent, StateTransition};
pub use timers::{
    ActionLock, CountdownKind, Countdowns, ManualScheduler, TaskHandle, TaskScheduler, TimerKind,
};
pub use types::{Coords, GameId, PieceType, Player, RawType, SystemTimeSource, TimeSource, Timestamp};
