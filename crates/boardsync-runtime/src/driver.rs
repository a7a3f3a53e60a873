//! Session driver
//!
//! Owns the [`GameClient`] and serializes everything that can touch it
//! (server messages, transport signals, local commands and fired timers)
//! into discrete turns on a single task. Each turn's effects and events are
//! handed to an [`EffectSink`] before the next turn starts.

use async_trait::async_trait;
use boardsync_core::{
    AppEvent, Effect, GameClient, HandlerOutput, NavigationDirection, ServerMessage, SyncRouter,
    TaskHandle, TransportSignal,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::FiredTimerReceiver;

// ----------------------------------------------------------------------------
// Driver Inputs
// ----------------------------------------------------------------------------

/// Commands issued by the local user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum LocalCommand {
    SubmitMove { compact: String },
    Resync,
    MainMenu,
    ReportOpponentsMove { reason: String },
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    Navigate { direction: NavigationDirection },
    ReleaseNavigation,
    Close,
}

/// Everything the driver reacts to, besides fired timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "camelCase")]
pub enum DriverInput {
    Server { message: ServerMessage },
    Transport { signal: TransportSignal },
    Command { command: LocalCommand },
    /// A measured round trip to the server
    RoundTrip { millis: u64 },
    Shutdown,
}

// ----------------------------------------------------------------------------
// Effect Sink
// ----------------------------------------------------------------------------

/// Destination of effects and application events
#[async_trait]
pub trait EffectSink: Send {
    async fn execute(&mut self, effect: Effect) -> RuntimeResult<()>;

    async fn notify(&mut self, event: AppEvent) -> RuntimeResult<()>;
}

/// Forwards effects and events over bounded channels
pub struct ChannelSink {
    effects: mpsc::Sender<Effect>,
    events: mpsc::Sender<AppEvent>,
}

impl ChannelSink {
    pub fn new(effects: mpsc::Sender<Effect>, events: mpsc::Sender<AppEvent>) -> Self {
        Self { effects, events }
    }
}

#[async_trait]
impl EffectSink for ChannelSink {
    async fn execute(&mut self, effect: Effect) -> RuntimeResult<()> {
        self.effects
            .send(effect)
            .await
            .map_err(|_| RuntimeError::ChannelClosed { channel: "effects" })
    }

    async fn notify(&mut self, event: AppEvent) -> RuntimeResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| RuntimeError::ChannelClosed { channel: "app events" })
    }
}

// ----------------------------------------------------------------------------
// Session Driver
// ----------------------------------------------------------------------------

/// Counters for the lifetime of a driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub messages_routed: u64,
    pub commands_processed: u64,
    pub commands_rejected: u64,
    pub timers_fired: u64,
    pub effects_executed: u64,
    pub events_emitted: u64,
}

pub struct SessionDriver {
    client: GameClient,
    inputs: mpsc::Receiver<DriverInput>,
    timers: FiredTimerReceiver,
    sink: Box<dyn EffectSink>,
    stats: DriverStats,
    running: bool,
}

impl SessionDriver {
    pub fn new(
        client: GameClient,
        inputs: mpsc::Receiver<DriverInput>,
        timers: FiredTimerReceiver,
        sink: Box<dyn EffectSink>,
    ) -> Self {
        Self {
            client,
            inputs,
            timers,
            sink,
            stats: DriverStats::default(),
            running: true,
        }
    }

    pub fn client(&self) -> &GameClient {
        &self.client
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Run until shutdown or until every input sender is dropped
    ///
    /// Returns the client so callers can inspect the final state. A closed
    /// output channel is unrecoverable and ends the loop with an error.
    pub async fn run(mut self) -> RuntimeResult<GameClient> {
        info!("Session driver starting");

        while self.running {
            tokio::select! {
                input = self.inputs.recv() => {
                    match input {
                        Some(input) => self.handle_input(input).await?,
                        None => {
                            info!("Input channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(handle) = self.timers.recv() => {
                    self.handle_timer(handle).await?;
                }
            }
        }

        info!(stats = ?self.stats, "Session driver stopped");
        Ok(self.client)
    }

    async fn handle_input(&mut self, input: DriverInput) -> RuntimeResult<()> {
        let output = match input {
            DriverInput::Server { message } => {
                self.stats.messages_routed += 1;
                debug!(action = %message.action, "Routing server message");
                SyncRouter::route_message(&mut self.client, &message)
            }
            DriverInput::Transport { signal } => {
                SyncRouter::route_transport_signal(&mut self.client, signal)
            }
            DriverInput::Command { command } => self.handle_command(command),
            DriverInput::RoundTrip { millis } => {
                self.client.record_round_trip(millis);
                HandlerOutput::new()
            }
            DriverInput::Shutdown => {
                info!("Shutdown requested");
                self.running = false;
                HandlerOutput::new()
            }
        };
        self.dispatch(output).await
    }

    fn handle_command(&mut self, command: LocalCommand) -> HandlerOutput {
        self.stats.commands_processed += 1;
        debug!(?command, "Processing command");

        let result = match command {
            LocalCommand::SubmitMove { compact } => self.client.submit_local_move(&compact),
            LocalCommand::Resync => {
                let mut out = HandlerOutput::new();
                self.client.resync_to_game(&mut out).map(|()| out)
            }
            LocalCommand::MainMenu => self.client.on_main_menu_press(),
            LocalCommand::ReportOpponentsMove { reason } => {
                self.client.report_opponents_move(&reason)
            }
            LocalCommand::OfferDraw => self.client.offer_draw(),
            LocalCommand::AcceptDraw => self.client.accept_draw(),
            LocalCommand::DeclineDraw => self.client.decline_draw(),
            LocalCommand::Navigate { direction } => self.client.navigate(direction),
            LocalCommand::ReleaseNavigation => {
                self.client.release_navigation();
                Ok(HandlerOutput::new())
            }
            LocalCommand::Close => {
                let mut out = HandlerOutput::new();
                self.client.close_game(&mut out).map(|()| out)
            }
        };

        result.unwrap_or_else(|e| {
            self.stats.commands_rejected += 1;
            warn!("Command rejected: {}", e);
            let mut out = HandlerOutput::new();
            out.event(AppEvent::error_notice(e.to_string()));
            out
        })
    }

    async fn handle_timer(&mut self, handle: TaskHandle) -> RuntimeResult<()> {
        self.stats.timers_fired += 1;
        let output = match self.client.on_timer_fired(handle) {
            Ok(output) => output,
            Err(e) => {
                error!(?handle, "Timer handling failed: {}", e);
                let mut out = HandlerOutput::new();
                out.event(AppEvent::error_notice(e.to_string()));
                out
            }
        };
        self.dispatch(output).await
    }

    async fn dispatch(&mut self, output: HandlerOutput) -> RuntimeResult<()> {
        let (effects, events) = output.into_parts();
        for effect in effects {
            self.stats.effects_executed += 1;
            self.sink.execute(effect).await?;
        }
        for event in events {
            self.stats.events_emitted += 1;
            self.sink.notify(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_wire_format() {
        let input: DriverInput = serde_json::from_value(json!({
            "input": "command",
            "command": { "command": "submitMove", "compact": "5,2>5,4" }
        }))
        .unwrap();
        assert_eq!(
            input,
            DriverInput::Command {
                command: LocalCommand::SubmitMove {
                    compact: "5,2>5,4".to_string()
                }
            }
        );

        let input: DriverInput = serde_json::from_value(json!({
            "input": "transport",
            "signal": "socket-closed"
        }))
        .unwrap();
        assert_eq!(
            input,
            DriverInput::Transport {
                signal: TransportSignal::SocketClosed
            }
        );
    }
}
