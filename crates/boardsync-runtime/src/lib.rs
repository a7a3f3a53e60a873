//! BoardSync Runtime
//!
//! This crate runs the synchronization core on tokio:
//! - `SessionDriver`: the single task that owns the game client and
//!   serializes messages, signals, commands and timers into turns
//! - `TokioScheduler`: cancellable timers backed by spawned sleeps
//! - `JsonFileStore`: the on-disk variant cache
//! - `RuntimeBuilder`: assembles and spawns the driver
//!
//! `boardsync-core` performs no I/O; this crate is where its effects meet
//! channels, timers and the file system.

pub mod builder;
pub mod driver;
pub mod error;
pub mod scheduler;
pub mod store;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use driver::{ChannelSink, DriverInput, DriverStats, EffectSink, LocalCommand, SessionDriver};
pub use error::{RuntimeError, RuntimeResult};
pub use scheduler::{FiredTimerReceiver, TokioScheduler};
pub use store::JsonFileStore;

// Re-export core types for convenience
pub use boardsync_core::{
    AppEvent, ClientConfig, Effect, GameClient, GameRequest, NavigationDirection, ServerMessage,
    TransportSignal,
};
