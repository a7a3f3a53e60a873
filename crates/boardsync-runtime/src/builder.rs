//! Runtime Builder API
//!
//! Provides a builder-style API for consumers (CLI and tests) to assemble a
//! [`SessionDriver`] around a [`GameClient`], spawn it, and get input and
//! output handles.

use boardsync_core::{
    AppEvent, ClientConfig, Effect, GameClient, MemoryVariantCache, ServerMessage,
    StartingPositionProvider, SyncError, SystemTimeSource, TimeSource, TransportSignal,
    VariantCache,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::driver::{ChannelSink, DriverInput, LocalCommand, SessionDriver};
use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::TokioScheduler;
use crate::store::JsonFileStore;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a session runtime
pub struct RuntimeBuilder {
    config: ClientConfig,
    channel_buffer_size: usize,
    cache: Option<Box<dyn VariantCache + Send>>,
    positions: Option<Box<dyn StartingPositionProvider + Send>>,
    time_source: Option<Box<dyn TimeSource + Send>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            channel_buffer_size: 1000,
            cache: None,
            positions: None,
            time_source: None,
        }
    }

    /// Set the client configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific variant cache instead of the configured one
    pub fn with_cache(mut self, cache: Box<dyn VariantCache + Send>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_positions(mut self, positions: Box<dyn StartingPositionProvider + Send>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource + Send>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Set channel buffer sizes
    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size.max(1);
        self
    }

    /// Assemble the driver without spawning it
    pub fn build(self) -> RuntimeResult<(SessionDriver, RuntimeHandle)> {
        self.config.validate().map_err(SyncError::from)?;

        let cache: Box<dyn VariantCache + Send> = match (self.cache, &self.config.storage.cache_dir) {
            (Some(cache), _) => cache,
            (None, Some(dir)) => {
                info!(dir = %dir.display(), "Using file variant cache");
                Box::new(JsonFileStore::new(dir.clone()))
            }
            (None, None) => Box::new(MemoryVariantCache::new()),
        };
        let time_source = self
            .time_source
            .unwrap_or_else(|| Box::new(SystemTimeSource::new()));

        let (scheduler, timers) = TokioScheduler::new();
        let mut client = GameClient::new(self.config, Box::new(scheduler), cache, time_source);
        if let Some(positions) = self.positions {
            client = client.with_positions(positions);
        }

        let (input_sender, input_receiver) = mpsc::channel(self.channel_buffer_size);
        let (effect_sender, effect_receiver) = mpsc::channel(self.channel_buffer_size);
        let (app_event_sender, app_event_receiver) = mpsc::channel(self.channel_buffer_size);

        let driver = SessionDriver::new(
            client,
            input_receiver,
            timers,
            Box::new(ChannelSink::new(effect_sender, app_event_sender)),
        );
        let handle = RuntimeHandle {
            input_sender,
            effect_receiver: Some(effect_receiver),
            app_event_receiver: Some(app_event_receiver),
            driver_handle: None,
        };
        Ok((driver, handle))
    }

    /// Build and spawn the driver on the current tokio runtime
    pub fn build_and_start(self) -> RuntimeResult<RuntimeHandle> {
        let (driver, mut handle) = self.build()?;
        handle.driver_handle = Some(tokio::spawn(driver.run()));
        info!("Session runtime started");
        Ok(handle)
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running session driver
///
/// The effect and event receivers must be drained; the driver waits when
/// their buffers are full.
pub struct RuntimeHandle {
    input_sender: mpsc::Sender<DriverInput>,
    effect_receiver: Option<mpsc::Receiver<Effect>>,
    app_event_receiver: Option<mpsc::Receiver<AppEvent>>,
    driver_handle: Option<JoinHandle<RuntimeResult<GameClient>>>,
}

impl RuntimeHandle {
    pub fn input_sender(&self) -> mpsc::Sender<DriverInput> {
        self.input_sender.clone()
    }

    /// Take the effect receiver (can only be called once)
    pub fn take_effect_receiver(&mut self) -> Option<mpsc::Receiver<Effect>> {
        self.effect_receiver.take()
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<mpsc::Receiver<AppEvent>> {
        self.app_event_receiver.take()
    }

    pub async fn send(&self, input: DriverInput) -> RuntimeResult<()> {
        self.input_sender
            .send(input)
            .await
            .map_err(|_| RuntimeError::ChannelClosed { channel: "inputs" })
    }

    pub async fn deliver_message(&self, message: ServerMessage) -> RuntimeResult<()> {
        self.send(DriverInput::Server { message }).await
    }

    pub async fn send_command(&self, command: LocalCommand) -> RuntimeResult<()> {
        self.send(DriverInput::Command { command }).await
    }

    pub async fn transport_signal(&self, signal: TransportSignal) -> RuntimeResult<()> {
        self.send(DriverInput::Transport { signal }).await
    }

    /// Check if the driver is still running
    pub fn is_running(&self) -> bool {
        self.driver_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the driver and return its client
    pub async fn shutdown(&mut self) -> RuntimeResult<GameClient> {
        info!("Shutting down session runtime");
        // The driver may have stopped on its own already
        let _ = self.send(DriverInput::Shutdown).await;

        let handle = self.driver_handle.take().ok_or(RuntimeError::TaskFailed {
            reason: "driver was never started".to_string(),
        })?;
        handle.await.map_err(|e| RuntimeError::TaskFailed {
            reason: format!("driver task panicked: {}", e),
        })?
    }
}
