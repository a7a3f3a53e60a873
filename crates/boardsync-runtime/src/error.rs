//! Runtime error types
//!
//! Store and codec failures surface as [`SyncError`] from the core and reach
//! callers through [`RuntimeError::Core`].

use boardsync_core::SyncError;

/// Errors raised by the runtime around the core
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Core error: {0}")]
    Core(#[from] SyncError),

    #[error("Channel '{channel}' closed")]
    ChannelClosed { channel: &'static str },

    #[error("Driver task failed: {reason}")]
    TaskFailed { reason: String },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
